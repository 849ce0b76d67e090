//! Risk-derived remediation tasks.
//!
//! A fixed template of tasks; each escalates from medium to high priority
//! when the metric it watches crosses its threshold.

use super::{ActivationMetrics, ApprovalMetrics, ConcentrationMetrics, MetricsOptions};
use crate::models::MetricKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskTask {
    /// Stable key for the task template entry.
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub priority: TaskPriority,
    /// The metric that drives the priority flag.
    pub metric_key: MetricKey,
    pub observed: f64,
    pub threshold: f64,
}

/// Build the fixed task list from the already-computed module outputs.
pub fn build(
    activation: &ActivationMetrics,
    concentration: &ConcentrationMetrics,
    approval: &ApprovalMetrics,
    options: &MetricsOptions,
) -> Vec<RiskTask> {
    let escalate = |crossed: bool| {
        if crossed {
            TaskPriority::High
        } else {
            TaskPriority::Medium
        }
    };

    vec![
        RiskTask {
            key: "reactivate_dormant",
            title: "Re-engage dormant publishers",
            description: "Run an activation campaign for publishers with no attributed revenue.",
            priority: escalate(activation.active_ratio < options.min_active_ratio),
            metric_key: MetricKey::ActiveRatio,
            observed: activation.active_ratio,
            threshold: options.min_active_ratio,
        },
        RiskTask {
            key: "diversify_head",
            title: "Diversify top-heavy revenue",
            description: "Recruit and grow mid-tier publishers to reduce dependence on the top 10.",
            priority: escalate(concentration.top10_share > options.max_top10_share),
            metric_key: MetricKey::Top10Share,
            observed: concentration.top10_share,
            threshold: options.max_top10_share,
        },
        RiskTask {
            key: "improve_approval",
            title: "Improve order approval rate",
            description: "Review decline reasons with the network and tighten traffic quality.",
            priority: escalate(approval.approval_rate < options.min_approval_rate),
            metric_key: MetricKey::ApprovalRate,
            observed: approval.approval_rate,
            threshold: options.min_approval_rate,
        },
    ]
}
