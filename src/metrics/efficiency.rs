//! Per-publisher efficiency ratios plus portfolio-level aggregates.

use super::{ratio, sorted_by_revenue};
use crate::models::PublisherRecord;

/// Efficiency ratios for one active publisher. Values are kept unrounded
/// here; display rounding happens where rows are materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyPoint {
    pub name: String,
    pub orders: f64,
    pub revenue: f64,
    pub commission: f64,
    /// commission / orders, 0 when there are no orders.
    pub cpa: f64,
    /// revenue / orders, 0 when there are no orders.
    pub aov: f64,
    /// revenue / commission, 0 when there is no commission.
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyMetrics {
    /// One point per active record, ordered revenue desc (shared comparator).
    pub points: Vec<EfficiencyPoint>,
    /// Total commission / total orders over active records.
    pub overall_cpa: f64,
    /// Total revenue / total orders over active records.
    pub overall_aov: f64,
    /// Total revenue / total commission over active records.
    pub overall_roi: f64,
}

pub fn compute(records: &[PublisherRecord]) -> EfficiencyMetrics {
    let points: Vec<EfficiencyPoint> = sorted_by_revenue(records)
        .into_iter()
        .filter(|r| r.is_active())
        .map(|r| EfficiencyPoint {
            name: r.name.clone(),
            orders: r.orders,
            revenue: r.total_revenue,
            commission: r.total_commission,
            cpa: ratio(r.total_commission, r.orders),
            aov: ratio(r.total_revenue, r.orders),
            roi: ratio(r.total_revenue, r.total_commission),
        })
        .collect();

    let orders: f64 = points.iter().map(|p| p.orders).sum();
    let revenue: f64 = points.iter().map(|p| p.revenue).sum();
    let commission: f64 = points.iter().map(|p| p.commission).sum();

    EfficiencyMetrics {
        overall_cpa: ratio(commission, orders),
        overall_aov: ratio(revenue, orders),
        overall_roi: ratio(revenue, commission),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublisherRecord;

    fn rec(name: &str, revenue: f64, commission: f64, orders: f64) -> PublisherRecord {
        PublisherRecord {
            name: name.to_string(),
            total_revenue: revenue,
            total_commission: commission,
            orders,
            ..Default::default()
        }
    }

    #[test]
    fn test_per_record_ratios() {
        let records = vec![rec("a", 200.0, 20.0, 4.0)];
        let m = compute(&records);
        let p = &m.points[0];

        assert_eq!(p.cpa, 5.0);
        assert_eq!(p.aov, 50.0);
        assert_eq!(p.roi, 10.0);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let records = vec![rec("a", 100.0, 0.0, 0.0)];
        let m = compute(&records);
        let p = &m.points[0];

        assert_eq!(p.cpa, 0.0);
        assert_eq!(p.aov, 0.0);
        assert_eq!(p.roi, 0.0);
        assert_eq!(m.overall_cpa, 0.0);
        assert_eq!(m.overall_roi, 0.0);
    }

    #[test]
    fn test_inactive_records_excluded() {
        let records = vec![rec("a", 100.0, 10.0, 2.0), rec("b", 0.0, 5.0, 1.0)];
        let m = compute(&records);
        assert_eq!(m.points.len(), 1);
        // Overall aggregates only cover the active set.
        assert_eq!(m.overall_cpa, 5.0);
    }

    #[test]
    fn test_points_ordered_by_revenue_desc() {
        let records = vec![
            rec("small", 10.0, 1.0, 1.0),
            rec("big", 100.0, 5.0, 2.0),
        ];
        let m = compute(&records);
        assert_eq!(m.points[0].name, "big");
        assert_eq!(m.points[1].name, "small");
    }
}
