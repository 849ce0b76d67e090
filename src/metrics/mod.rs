//! Aggregation engine.
//!
//! Six independent pure computations over the same normalized record array
//! (activation, concentration, mix health, approval, efficiency, tiering)
//! plus the risk-derived remediation task list. None of these persist
//! anything; recomputing over identical input yields identical output.
//!
//! Hard invariant: every division is guarded by an explicit zero-check and
//! returns 0 instead of NaN or infinity.

pub mod activation;
pub mod approval;
pub mod concentration;
pub mod efficiency;
pub mod mix;
pub mod tasks;
pub mod tiering;

use crate::models::{MetricKey, MetricValue, ModuleId, PublisherRecord};
use std::cmp::Ordering;
use tracing::debug;

pub use activation::ActivationMetrics;
pub use approval::ApprovalMetrics;
pub use concentration::ConcentrationMetrics;
pub use efficiency::{EfficiencyMetrics, EfficiencyPoint};
pub use mix::MixBucket;
pub use tasks::{RiskTask, TaskPriority};
pub use tiering::{Tier, TierSummaryRow, TieringMetrics};

/// Tunables for tiering ranks and risk thresholds.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    /// Highest rank (1-based, inclusive) assigned to Tier1.
    pub tier1_rank: usize,
    /// Highest rank (1-based, inclusive) assigned to Tier2.
    pub tier2_rank: usize,
    /// Members listed per tier in the tier summary.
    pub tier_top_members: usize,
    /// Below this active ratio the activation task escalates to high.
    pub min_active_ratio: f64,
    /// Above this top-10 share the concentration task escalates to high.
    pub max_top10_share: f64,
    /// Below this approval rate the approval task escalates to high.
    pub min_approval_rate: f64,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            tier1_rank: 10,
            tier2_rank: 50,
            tier_top_members: 5,
            min_active_ratio: 0.4,
            max_top10_share: 0.5,
            min_approval_rate: 0.85,
        }
    }
}

/// Guarded division: 0 whenever the denominator is not strictly positive.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Round to 2 decimals for display values.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Explicit comparator shared by concentration and tiering: revenue
/// descending, ties broken by original normalized position ascending. Does
/// not rely on the host sort being stable.
pub fn sorted_by_revenue(records: &[PublisherRecord]) -> Vec<&PublisherRecord> {
    let mut indices: Vec<usize> = (0..records.len()).collect();
    indices.sort_by(|&a, &b| {
        records[b]
            .total_revenue
            .partial_cmp(&records[a].total_revenue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    indices.into_iter().map(|i| &records[i]).collect()
}

/// Active records (revenue > 0) in original normalized order.
pub fn active_records(records: &[PublisherRecord]) -> Vec<&PublisherRecord> {
    records.iter().filter(|r| r.is_active()).collect()
}

/// The complete output of one aggregation pass.
#[derive(Debug, Clone)]
pub struct MetricSet {
    pub activation: ActivationMetrics,
    pub concentration: ConcentrationMetrics,
    pub mix: Vec<MixBucket>,
    pub approval: ApprovalMetrics,
    pub efficiency: EfficiencyMetrics,
    pub tiering: TieringMetrics,
    pub tasks: Vec<RiskTask>,
}

impl MetricSet {
    /// Flatten into persistable metric rows: the closed fixed-key set plus
    /// one `{bucket}_share` row per mix bucket.
    pub fn metric_rows(&self) -> Vec<MetricValue> {
        let a = &self.activation;
        let c = &self.concentration;
        let ap = &self.approval;
        let e = &self.efficiency;

        let mut rows = vec![
            MetricValue::fixed(
                MetricKey::TotalPublishers,
                a.total_publishers as f64,
                ModuleId::Activation,
            ),
            MetricValue::fixed(
                MetricKey::ActivePublishers,
                a.active_publishers as f64,
                ModuleId::Activation,
            ),
            MetricValue::fixed(MetricKey::ActiveRatio, a.active_ratio, ModuleId::Activation),
            MetricValue::fixed(MetricKey::TotalGmv, a.total_gmv, ModuleId::Activation),
            MetricValue::fixed(
                MetricKey::GmvPerActive,
                a.gmv_per_active,
                ModuleId::Activation,
            ),
            MetricValue::fixed(MetricKey::Top1Share, c.top1_share, ModuleId::Concentration),
            MetricValue::fixed(MetricKey::Top3Share, c.top3_share, ModuleId::Concentration),
            MetricValue::fixed(MetricKey::Top10Share, c.top10_share, ModuleId::Concentration),
            MetricValue::fixed(
                MetricKey::PublishersTo50Pct,
                c.publishers_to_50pct as f64,
                ModuleId::Concentration,
            ),
            MetricValue::fixed(
                MetricKey::ApprovedRevenue,
                ap.approved_revenue,
                ModuleId::Approval,
            ),
            MetricValue::fixed(
                MetricKey::PendingRevenue,
                ap.pending_revenue,
                ModuleId::Approval,
            ),
            MetricValue::fixed(
                MetricKey::DeclinedRevenue,
                ap.declined_revenue,
                ModuleId::Approval,
            ),
            MetricValue::fixed(MetricKey::ApprovalRate, ap.approval_rate, ModuleId::Approval),
            MetricValue::fixed(MetricKey::OverallCpa, e.overall_cpa, ModuleId::Efficiency),
            MetricValue::fixed(MetricKey::OverallAov, e.overall_aov, ModuleId::Efficiency),
            MetricValue::fixed(MetricKey::OverallRoi, e.overall_roi, ModuleId::Efficiency),
        ];

        for bucket in &self.mix {
            rows.push(MetricValue::bucket_share(&bucket.key, bucket.gmv_share));
        }

        rows
    }
}

/// Run all six modules plus the task list over the normalized records.
pub fn compute_all(records: &[PublisherRecord], options: &MetricsOptions) -> MetricSet {
    let activation = activation::compute(records);
    let concentration = concentration::compute(records, activation.total_gmv);
    let mix = mix::compute(records, activation.total_gmv);
    let approval = approval::compute(records, activation.total_gmv);
    let efficiency = efficiency::compute(records);
    let tiering = tiering::compute(records, activation.total_gmv, options);
    let tasks = tasks::build(&activation, &concentration, &approval, options);

    debug!(
        total = activation.total_publishers,
        active = activation.active_publishers,
        buckets = mix.len(),
        "aggregation pass complete"
    );

    MetricSet {
        activation,
        concentration,
        mix,
        approval,
        efficiency,
        tiering,
        tasks,
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::models::PublisherRecord;

    /// Shorthand record used across the metrics tests.
    pub fn record(name: &str, revenue: f64) -> PublisherRecord {
        PublisherRecord {
            name: name.to_string(),
            total_revenue: revenue,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::record;
    use super::*;

    #[test]
    fn test_ratio_guards_zero_denominator() {
        assert_eq!(ratio(10.0, 0.0), 0.0);
        assert_eq!(ratio(10.0, -5.0), 0.0);
        assert_eq!(ratio(1.0, 4.0), 0.25);
    }

    #[test]
    fn test_sorted_by_revenue_breaks_ties_by_position() {
        let records = vec![
            record("b", 50.0),
            record("a", 100.0),
            record("c", 50.0),
        ];
        let sorted = sorted_by_revenue(&records);
        let names: Vec<&str> = sorted.iter().map(|r| r.name.as_str()).collect();
        // Equal revenues keep their original normalized order.
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_metric_rows_include_bucket_family() {
        let mut records = vec![record("a", 100.0), record("b", 50.0)];
        records[0].publisher_type = "Content".to_string();
        records[1].publisher_type = "Coupon".to_string();

        let set = compute_all(&records, &MetricsOptions::default());
        let rows = set.metric_rows();

        assert!(rows.iter().any(|r| r.metric_key == "active_ratio"));
        assert!(rows.iter().any(|r| r.metric_key == "content_share"));
        assert!(rows.iter().any(|r| r.metric_key == "deal_coupon_share"));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let records = vec![record("a", 120.0), record("b", 0.0), record("c", 30.0)];
        let options = MetricsOptions::default();

        let first = compute_all(&records, &options).metric_rows();
        let second = compute_all(&records, &options).metric_rows();
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::testutil::record;
    use super::*;
    use proptest::prelude::*;

    const TYPES: [&str; 4] = ["Content", "Coupon", "Cashback", ""];

    fn arb_records() -> impl Strategy<Value = Vec<PublisherRecord>> {
        prop::collection::vec((0.0f64..100_000.0, 0usize..TYPES.len()), 0..120).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, (revenue, type_idx))| {
                        let mut r = record(&format!("p{}", i), revenue);
                        r.publisher_type = TYPES[type_idx].to_string();
                        r
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_active_ratio_in_unit_interval(records in arb_records()) {
            let m = activation::compute(&records);
            prop_assert!(m.active_ratio >= 0.0 && m.active_ratio <= 1.0);
        }

        #[test]
        fn prop_topk_shares_monotone(records in arb_records()) {
            let a = activation::compute(&records);
            let c = concentration::compute(&records, a.total_gmv);
            prop_assert!(c.top1_share <= c.top3_share + 1e-9);
            prop_assert!(c.top3_share <= c.top10_share + 1e-9);
            prop_assert!(c.top10_share <= 1.0 + 1e-9);
        }

        #[test]
        fn prop_mix_shares_sum_to_active_share(records in arb_records()) {
            let a = activation::compute(&records);
            let buckets = mix::compute(&records, a.total_gmv);
            let share_sum: f64 = buckets.iter().map(|b| b.gmv_share).sum();
            let active_gmv: f64 = records
                .iter()
                .filter(|r| r.is_active())
                .map(|r| r.total_revenue)
                .sum();
            let expected = ratio(active_gmv, a.total_gmv);
            prop_assert!((share_sum - expected).abs() < 1e-4);
            prop_assert!(share_sum <= 1.0 + 1e-6);
        }

        #[test]
        fn prop_half_gmv_boundary(records in arb_records()) {
            let a = activation::compute(&records);
            let c = concentration::compute(&records, a.total_gmv);
            if a.total_gmv > 0.0 {
                let sorted = concentration::sorted_active(&records);
                let k = c.publishers_to_50pct;
                prop_assert!(k >= 1);
                let prefix: f64 = sorted.iter().take(k).map(|r| r.total_revenue).sum();
                prop_assert!(prefix >= 0.5 * a.total_gmv - 1e-3);
                if k > 1 {
                    let prev: f64 = sorted.iter().take(k - 1).map(|r| r.total_revenue).sum();
                    prop_assert!(prev < 0.5 * a.total_gmv);
                }
            } else {
                prop_assert_eq!(c.publishers_to_50pct, 0);
            }
        }
    }
}
