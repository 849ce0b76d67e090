//! Activation metrics: how much of the publisher base actually produces.

use super::ratio;
use crate::models::PublisherRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationMetrics {
    pub total_publishers: usize,
    pub active_publishers: usize,
    /// active / total, 0 when the dataset is empty.
    pub active_ratio: f64,
    /// Sum of total_revenue over all records.
    pub total_gmv: f64,
    /// total_gmv / active count, 0 when nothing is active.
    pub gmv_per_active: f64,
}

pub fn compute(records: &[PublisherRecord]) -> ActivationMetrics {
    let total_publishers = records.len();
    let active_publishers = records.iter().filter(|r| r.is_active()).count();
    let total_gmv: f64 = records.iter().map(|r| r.total_revenue).sum();

    ActivationMetrics {
        total_publishers,
        active_publishers,
        active_ratio: ratio(active_publishers as f64, total_publishers as f64),
        total_gmv,
        gmv_per_active: ratio(total_gmv, active_publishers as f64),
    }
}
