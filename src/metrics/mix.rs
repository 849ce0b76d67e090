//! Structural mix: active publishers grouped into normalized type buckets.

use super::{active_records, ratio};
use crate::models::PublisherRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One normalized publisher-type bucket over the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixBucket {
    pub key: String,
    pub count: usize,
    pub gmv: f64,
    /// count / active count.
    pub count_share: f64,
    /// gmv / total GMV (over all records, so the bucket shares sum to the
    /// active share of GMV, not necessarily 1).
    pub gmv_share: f64,
}

/// Normalize a free-form publisher type into a bucket key: lowercase,
/// non-alphanumeric runs collapsed to a single underscore, trimmed.
/// Deal/coupon/voucher variants canonicalize to `deal_coupon`; anything
/// empty maps to `other`.
pub fn bucket_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_sep = true;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            key.extend(c.to_lowercase());
            last_sep = false;
        } else if !last_sep {
            key.push('_');
            last_sep = true;
        }
    }
    let key = key.trim_matches('_').to_string();

    if key.is_empty() {
        return "other".to_string();
    }
    let is_deal_coupon = key
        .split('_')
        .any(|token| matches!(token, "deal" | "deals" | "coupon" | "coupons" | "voucher" | "vouchers"));
    if is_deal_coupon {
        return "deal_coupon".to_string();
    }
    key
}

/// Bucket the active records. Output is sorted by GMV descending, ties by
/// key ascending, for reproducible ordering.
pub fn compute(records: &[PublisherRecord], total_gmv: f64) -> Vec<MixBucket> {
    let active = active_records(records);
    let active_count = active.len();

    let mut counts: HashMap<String, (usize, f64)> = HashMap::new();
    for record in &active {
        let entry = counts.entry(bucket_key(&record.publisher_type)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.total_revenue;
    }

    let mut buckets: Vec<MixBucket> = counts
        .into_iter()
        .map(|(key, (count, gmv))| MixBucket {
            key,
            count,
            gmv,
            count_share: ratio(count as f64, active_count as f64),
            gmv_share: ratio(gmv, total_gmv),
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.gmv
            .partial_cmp(&a.gmv)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testutil::record;

    fn typed(name: &str, revenue: f64, publisher_type: &str) -> PublisherRecord {
        PublisherRecord {
            publisher_type: publisher_type.to_string(),
            ..record(name, revenue)
        }
    }

    #[test]
    fn test_bucket_key_normalization() {
        assert_eq!(bucket_key("Content"), "content");
        assert_eq!(bucket_key("Cash-Back / Loyalty"), "cash_back_loyalty");
        assert_eq!(bucket_key("  Sub Network  "), "sub_network");
        assert_eq!(bucket_key(""), "other");
        assert_eq!(bucket_key("???"), "other");
    }

    #[test]
    fn test_bucket_key_deal_coupon_variants() {
        assert_eq!(bucket_key("Coupon"), "deal_coupon");
        assert_eq!(bucket_key("Deals & Coupons"), "deal_coupon");
        assert_eq!(bucket_key("voucher codes"), "deal_coupon");
        assert_eq!(bucket_key("Deal Site"), "deal_coupon");
        // "dealer" is not a deal/coupon variant.
        assert_eq!(bucket_key("Dealer Network"), "dealer_network");
    }

    #[test]
    fn test_single_bucket_worked_example() {
        // 5 content publishers, gmv 500 of 500 total.
        let records: Vec<_> = (0..5)
            .map(|i| typed(&format!("p{}", i), 100.0, "Content"))
            .collect();
        let buckets = compute(&records, 500.0);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key, "content");
        assert_eq!(buckets[0].count, 5);
        assert_eq!(buckets[0].gmv, 500.0);
        assert_eq!(buckets[0].count_share, 1.0);
        assert_eq!(buckets[0].gmv_share, 1.0);
    }

    #[test]
    fn test_inactive_records_excluded() {
        let records = vec![
            typed("a", 100.0, "Content"),
            typed("b", 0.0, "Content"),
            typed("c", 50.0, "Coupon"),
        ];
        let buckets = compute(&records, 150.0);

        let content = buckets.iter().find(|b| b.key == "content").unwrap();
        assert_eq!(content.count, 1);
        assert!((content.count_share - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_gmv_shares_sum_to_active_share() {
        let records = vec![
            typed("a", 60.0, "Content"),
            typed("b", 30.0, "Coupon"),
            typed("c", 10.0, "Cashback"),
            typed("d", 0.0, "Content"),
        ];
        let total_gmv = 100.0;
        let buckets = compute(&records, total_gmv);

        let share_sum: f64 = buckets.iter().map(|b| b.gmv_share).sum();
        let active_gmv: f64 = records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.total_revenue)
            .sum();
        assert!((share_sum - active_gmv / total_gmv).abs() < 1e-9);
        assert!(share_sum <= 1.0 + 1e-9);
    }

    #[test]
    fn test_deterministic_ordering() {
        let records = vec![
            typed("a", 10.0, "alpha"),
            typed("b", 10.0, "beta"),
            typed("c", 90.0, "content"),
        ];
        let buckets = compute(&records, 110.0);
        let keys: Vec<&str> = buckets.iter().map(|b| b.key.as_str()).collect();
        // GMV desc, then key asc for the tie.
        assert_eq!(keys, vec!["content", "alpha", "beta"]);
    }
}
