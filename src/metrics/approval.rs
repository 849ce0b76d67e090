//! Approval status metrics, computed over all records (active or not).

use super::ratio;
use crate::models::PublisherRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalMetrics {
    pub approved_revenue: f64,
    pub pending_revenue: f64,
    pub declined_revenue: f64,
    /// approved / total GMV, 0 when total GMV is 0.
    pub approval_rate: f64,
}

pub fn compute(records: &[PublisherRecord], total_gmv: f64) -> ApprovalMetrics {
    let approved_revenue: f64 = records.iter().map(|r| r.approved_revenue).sum();
    let pending_revenue: f64 = records.iter().map(|r| r.pending_revenue).sum();
    let declined_revenue: f64 = records.iter().map(|r| r.declined_revenue).sum();

    ApprovalMetrics {
        approved_revenue,
        pending_revenue,
        declined_revenue,
        approval_rate: ratio(approved_revenue, total_gmv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublisherRecord;

    #[test]
    fn test_worked_example() {
        // Revenue [100, 0, 50], approved [80, 0, 50] → rate 130/150.
        let records = vec![
            PublisherRecord {
                name: "a".into(),
                total_revenue: 100.0,
                approved_revenue: 80.0,
                ..Default::default()
            },
            PublisherRecord {
                name: "b".into(),
                ..Default::default()
            },
            PublisherRecord {
                name: "c".into(),
                total_revenue: 50.0,
                approved_revenue: 50.0,
                ..Default::default()
            },
        ];
        let m = compute(&records, 150.0);

        assert_eq!(m.approved_revenue, 130.0);
        assert!((m.approval_rate - 130.0 / 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_records_still_counted() {
        // Pending revenue on a zero-revenue record is part of the totals.
        let records = vec![PublisherRecord {
            name: "a".into(),
            total_revenue: 0.0,
            pending_revenue: 40.0,
            ..Default::default()
        }];
        let m = compute(&records, 0.0);
        assert_eq!(m.pending_revenue, 40.0);
        assert_eq!(m.approval_rate, 0.0);
    }
}
