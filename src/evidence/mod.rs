//! Evidence table builder.
//!
//! Derives display-ready row sets from the normalized records and the
//! aggregation output. Rows are plain structured records formatted for
//! direct display; ordering is significant and reproducible, and every
//! number traces back to the same normalized record set the metrics came
//! from.

use crate::metrics::concentration::sorted_active;
use crate::metrics::{round2, MetricSet, TaskPriority};
use crate::models::{EvidenceTable, EvidenceTableKey, ModuleId, PublisherRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Rows in the top-publishers table.
const TOP_N: usize = 20;
/// Target pareto resolution: stride sampling caps the curve at this many
/// interior points plus the final one.
const PARETO_POINTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPublisherRow {
    pub rank: usize,
    pub name: String,
    pub revenue: f64,
    /// Share of total GMV.
    pub pct: f64,
    /// Cumulative share through this row.
    pub cum_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    /// Cumulative publisher share, 0–100.
    pub publisher_pct: f64,
    /// Cumulative GMV share, 0–100.
    pub gmv_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterRow {
    pub name: String,
    pub orders: f64,
    pub revenue: f64,
    pub commission: f64,
    pub cpa: f64,
    pub aov: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDetailRow {
    pub name: String,
    pub total_revenue: f64,
    pub approved_revenue: f64,
    pub declined_revenue: f64,
    pub approval_rate: f64,
    pub decline_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub key: String,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub metric_key: String,
    pub observed: f64,
    pub threshold: f64,
}

/// Build every evidence table for one dataset pass.
pub fn build_all(records: &[PublisherRecord], metrics: &MetricSet) -> Vec<EvidenceTable> {
    let total_gmv = metrics.activation.total_gmv;
    let sorted = sorted_active(records);

    let tables = vec![
        EvidenceTable::from_rows(
            EvidenceTableKey::TopPublishers,
            ModuleId::Concentration,
            &top_publishers(&sorted, total_gmv),
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::Pareto,
            ModuleId::Concentration,
            &pareto_points(&sorted, total_gmv),
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::EfficiencyScatter,
            ModuleId::Efficiency,
            &efficiency_scatter(metrics),
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::ApprovalDetail,
            ModuleId::Approval,
            &approval_detail(records),
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::MixBreakdown,
            ModuleId::MixHealth,
            &metrics.mix,
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::TierSummary,
            ModuleId::Tiering,
            &metrics.tiering.summary,
        ),
        EvidenceTable::from_rows(
            EvidenceTableKey::ActionTimeline,
            ModuleId::Risk,
            &action_timeline(metrics),
        ),
    ];

    debug!(tables = tables.len(), "evidence tables built");
    tables
}

/// First `TOP_N` sorted-active records. `cum_pct` re-sums the prefix up to
/// and including each row so it matches the concentration module's own
/// prefix sums exactly.
pub fn top_publishers(sorted_active: &[&PublisherRecord], total_gmv: f64) -> Vec<TopPublisherRow> {
    if total_gmv <= 0.0 {
        return Vec::new();
    }
    sorted_active
        .iter()
        .take(TOP_N)
        .enumerate()
        .map(|(i, record)| {
            let prefix: f64 = sorted_active[..=i].iter().map(|r| r.total_revenue).sum();
            TopPublisherRow {
                rank: i + 1,
                name: record.name.clone(),
                revenue: round2(record.total_revenue),
                pct: record.total_revenue / total_gmv,
                cum_pct: prefix / total_gmv,
            }
        })
        .collect()
}

/// Fixed-resolution concentration curve: walk the sorted-active list once,
/// emitting a point every `ceil(n / PARETO_POINTS)` records plus one at the
/// last index, for at most `PARETO_POINTS + 1` points.
pub fn pareto_points(sorted_active: &[&PublisherRecord], total_gmv: f64) -> Vec<ParetoPoint> {
    let n = sorted_active.len();
    if n == 0 || total_gmv <= 0.0 {
        return Vec::new();
    }

    let stride = n.div_ceil(PARETO_POINTS).max(1);
    let mut points = Vec::new();
    let mut cumulative = 0.0;

    for (i, record) in sorted_active.iter().enumerate() {
        cumulative += record.total_revenue;
        if i % stride == 0 || i == n - 1 {
            points.push(ParetoPoint {
                publisher_pct: (i + 1) as f64 / n as f64 * 100.0,
                gmv_pct: cumulative / total_gmv * 100.0,
            });
        }
    }

    points
}

/// One row per active record, no downsampling. Display values are rounded;
/// the ordering came from the unrounded revenue sort.
fn efficiency_scatter(metrics: &MetricSet) -> Vec<ScatterRow> {
    metrics
        .efficiency
        .points
        .iter()
        .map(|p| ScatterRow {
            name: p.name.clone(),
            orders: p.orders,
            revenue: round2(p.revenue),
            commission: round2(p.commission),
            cpa: round2(p.cpa),
            aov: round2(p.aov),
            roi: round2(p.roi),
        })
        .collect()
}

/// One row per record with revenue, sorted by decline rate descending
/// (unrounded), ties broken by original normalized order.
fn approval_detail(records: &[PublisherRecord]) -> Vec<ApprovalDetailRow> {
    let mut detail: Vec<(usize, ApprovalDetailRow)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.total_revenue > 0.0)
        .map(|(i, r)| {
            (
                i,
                ApprovalDetailRow {
                    name: r.name.clone(),
                    total_revenue: round2(r.total_revenue),
                    approved_revenue: round2(r.approved_revenue),
                    declined_revenue: round2(r.declined_revenue),
                    approval_rate: r.approved_revenue / r.total_revenue,
                    decline_rate: r.declined_revenue / r.total_revenue,
                },
            )
        })
        .collect();

    detail.sort_by(|(ia, a), (ib, b)| {
        b.decline_rate
            .partial_cmp(&a.decline_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| ia.cmp(ib))
    });

    detail.into_iter().map(|(_, row)| row).collect()
}

/// High-priority tasks first, then the template order.
fn action_timeline(metrics: &MetricSet) -> Vec<TaskRow> {
    let mut rows: Vec<TaskRow> = metrics
        .tasks
        .iter()
        .map(|t| TaskRow {
            key: t.key.to_string(),
            title: t.title.to_string(),
            description: t.description.to_string(),
            priority: t.priority,
            metric_key: t.metric_key.as_str().to_string(),
            observed: t.observed,
            threshold: t.threshold,
        })
        .collect();
    rows.sort_by(|a, b| b.priority.cmp(&a.priority));
    rows
}
