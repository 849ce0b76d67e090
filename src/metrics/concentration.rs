//! Revenue concentration: top-K shares and the 50% head count.

use super::{ratio, sorted_by_revenue};
use crate::models::PublisherRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationMetrics {
    pub top1_share: f64,
    pub top3_share: f64,
    pub top10_share: f64,
    /// Smallest K such that the top K active publishers cover at least half
    /// of total GMV. Defined as 0 when total_gmv <= 0.
    pub publishers_to_50pct: usize,
}

pub fn compute(records: &[PublisherRecord], total_gmv: f64) -> ConcentrationMetrics {
    let sorted = sorted_active(records);

    ConcentrationMetrics {
        top1_share: top_k_share(&sorted, 1, total_gmv),
        top3_share: top_k_share(&sorted, 3, total_gmv),
        top10_share: top_k_share(&sorted, 10, total_gmv),
        publishers_to_50pct: publishers_to_half(&sorted, total_gmv),
    }
}

/// Active records sorted by the shared explicit comparator.
pub fn sorted_active(records: &[PublisherRecord]) -> Vec<&PublisherRecord> {
    sorted_by_revenue(records)
        .into_iter()
        .filter(|r| r.is_active())
        .collect()
}

fn top_k_share(sorted_active: &[&PublisherRecord], k: usize, total_gmv: f64) -> f64 {
    let head: f64 = sorted_active
        .iter()
        .take(k)
        .map(|r| r.total_revenue)
        .sum();
    ratio(head, total_gmv)
}

/// Walk the sorted list once, counting records until the running sum reaches
/// half of total GMV.
fn publishers_to_half(sorted_active: &[&PublisherRecord], total_gmv: f64) -> usize {
    if total_gmv <= 0.0 {
        return 0;
    }
    let target = 0.5 * total_gmv;
    let mut cumulative = 0.0;
    let mut count = 0;
    for record in sorted_active {
        cumulative += record.total_revenue;
        count += 1;
        if cumulative >= target {
            return count;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testutil::record;

    #[test]
    fn test_worked_example_top1() {
        let records = vec![record("a", 100.0), record("b", 0.0), record("c", 50.0)];
        let m = compute(&records, 150.0);
        assert!((m.top1_share - 100.0 / 150.0).abs() < 1e-9);
        assert_eq!(m.top3_share, 1.0);
        assert_eq!(m.top10_share, 1.0);
        assert_eq!(m.publishers_to_50pct, 1);
    }

    #[test]
    fn test_topk_monotone() {
        let records: Vec<_> = (0..15)
            .map(|i| record(&format!("p{}", i), (15 - i) as f64 * 10.0))
            .collect();
        let total: f64 = records.iter().map(|r| r.total_revenue).sum();
        let m = compute(&records, total);

        assert!(m.top1_share <= m.top3_share);
        assert!(m.top3_share <= m.top10_share);
        assert!(m.top10_share <= 1.0 + 1e-9);
    }

    #[test]
    fn test_publishers_to_50pct_boundary() {
        // 100 + 60 = 160 >= 150 (half of 300), 100 alone is not.
        let records = vec![
            record("a", 100.0),
            record("b", 60.0),
            record("c", 60.0),
            record("d", 40.0),
            record("e", 40.0),
        ];
        let total = 300.0;
        let m = compute(&records, total);
        assert_eq!(m.publishers_to_50pct, 2);

        let sorted = sorted_active(&records);
        let prefix: f64 = sorted.iter().take(2).map(|r| r.total_revenue).sum();
        let prefix_minus_one: f64 = sorted.iter().take(1).map(|r| r.total_revenue).sum();
        assert!(prefix >= 0.5 * total);
        assert!(prefix_minus_one < 0.5 * total);
    }

    #[test]
    fn test_zero_gmv_policy() {
        // Populated list of zero-revenue rows: fixed policy says 0, and the
        // shares are 0 rather than NaN.
        let records = vec![record("a", 0.0), record("b", 0.0)];
        let m = compute(&records, 0.0);
        assert_eq!(m.publishers_to_50pct, 0);
        assert_eq!(m.top1_share, 0.0);
        assert_eq!(m.top10_share, 0.0);

        let empty = compute(&[], 0.0);
        assert_eq!(empty.publishers_to_50pct, 0);
    }

    #[test]
    fn test_fewer_actives_than_k_shares_equal() {
        let records = vec![record("a", 100.0), record("b", 20.0)];
        let m = compute(&records, 120.0);
        // Only 2 active records: top3 and top10 both cover everything.
        assert_eq!(m.top3_share, m.top10_share);
        assert_eq!(m.top10_share, 1.0);
    }
}
