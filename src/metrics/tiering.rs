//! Revenue tiering over all records.
//!
//! Assignment rule, in priority order per record: zero or negative revenue
//! forces Tier4 regardless of rank; otherwise rank <= tier1_rank is Tier1,
//! rank <= tier2_rank is Tier2, and everything else is Tier3.

use super::{ratio, sorted_by_revenue, MetricsOptions};
use crate::models::PublisherRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Tier1, Tier::Tier2, Tier::Tier3, Tier::Tier4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Tier4 => "tier4",
        }
    }

    /// Display label used in tables and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Tier 1 (core drivers)",
            Tier::Tier2 => "Tier 2 (growth)",
            Tier::Tier3 => "Tier 3 (long tail)",
            Tier::Tier4 => "Tier 4 (dormant)",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One publisher's tier assignment, in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct TierAssignment {
    pub rank: usize,
    pub name: String,
    pub revenue: f64,
    pub tier: Tier,
}

/// Per-tier rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSummaryRow {
    pub tier: Tier,
    pub count: usize,
    pub gmv: f64,
    pub gmv_share: f64,
    /// Top members of the tier by revenue.
    pub top_members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TieringMetrics {
    /// All records in rank order (revenue desc, original position tie-break).
    pub assignments: Vec<TierAssignment>,
    /// Always four rows, Tier1 through Tier4.
    pub summary: Vec<TierSummaryRow>,
}

pub fn compute(
    records: &[PublisherRecord],
    total_gmv: f64,
    options: &MetricsOptions,
) -> TieringMetrics {
    let sorted = sorted_by_revenue(records);

    let assignments: Vec<TierAssignment> = sorted
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let rank = i + 1;
            let tier = if record.total_revenue <= 0.0 {
                Tier::Tier4
            } else if rank <= options.tier1_rank {
                Tier::Tier1
            } else if rank <= options.tier2_rank {
                Tier::Tier2
            } else {
                Tier::Tier3
            };
            TierAssignment {
                rank,
                name: record.name.clone(),
                revenue: record.total_revenue,
                tier,
            }
        })
        .collect();

    let summary = Tier::ALL
        .iter()
        .map(|&tier| {
            let members: Vec<&TierAssignment> =
                assignments.iter().filter(|a| a.tier == tier).collect();
            let gmv: f64 = members.iter().map(|a| a.revenue).sum();
            TierSummaryRow {
                tier,
                count: members.len(),
                gmv,
                gmv_share: ratio(gmv, total_gmv),
                // Assignments are already rank-ordered, so the head of the
                // filtered list is the tier's top members by revenue.
                top_members: members
                    .iter()
                    .take(options.tier_top_members)
                    .map(|a| a.name.clone())
                    .collect(),
            }
        })
        .collect();

    TieringMetrics {
        assignments,
        summary,
    }
}
