//! Report generation from a stored snapshot.
//!
//! Renders markdown or JSON from the persisted metric and evidence rows.
//! Every number in the output comes from the snapshot; nothing here is
//! allowed to compute or invent a value the pipeline did not persist.

use crate::config::ReportConfig;
use crate::evidence::{ApprovalDetailRow, ParetoPoint, TaskRow, TopPublisherRow};
use crate::metrics::{MixBucket, TaskPriority, TierSummaryRow};
use crate::models::EvidenceTableKey;
use crate::store::Snapshot;
use anyhow::Result;

/// Generate a complete markdown report for a snapshot.
pub fn generate_markdown_report(snapshot: &Snapshot, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# Publisher Performance Report\n\n");
    output.push_str(&generate_metadata_section(snapshot));
    output.push_str(&generate_headline_section(snapshot));
    output.push_str(&generate_concentration_section(snapshot, config));
    output.push_str(&generate_mix_section(snapshot));
    output.push_str(&generate_tier_section(snapshot));
    output.push_str(&generate_approval_section(snapshot));
    output.push_str(&generate_actions_section(snapshot));
    output.push_str("---\n\n*Report generated by pubmetrics*\n");

    output
}

/// Generate a JSON report (the snapshot itself, pretty-printed).
pub fn generate_json_report(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).map_err(Into::into)
}

/// Look up a fixed metric value by key.
fn metric(snapshot: &Snapshot, key: &str) -> Option<f64> {
    snapshot
        .metrics
        .rows
        .iter()
        .find(|r| r.metric_key == key)
        .map(|r| r.value_num)
}

/// Deserialize the rows of one evidence table.
fn table_rows<T: serde::de::DeserializeOwned>(
    snapshot: &Snapshot,
    key: EvidenceTableKey,
) -> Vec<T> {
    snapshot
        .evidence
        .tables
        .iter()
        .find(|t| t.table_key == key)
        .and_then(|t| serde_json::from_value(t.data_json.clone()).ok())
        .unwrap_or_default()
}

fn fmt_money(value: f64) -> String {
    format!("{:.2}", value)
}

fn fmt_pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn generate_metadata_section(snapshot: &Snapshot) -> String {
    let mut section = String::new();
    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Dataset:** {}\n",
        snapshot.metrics.dataset_id
    ));
    section.push_str(&format!(
        "- **Calc Version:** `{}`\n",
        snapshot.metrics.calc_version
    ));
    section.push_str(&format!(
        "- **Computed At:** {}\n",
        snapshot.metrics.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Metric Rows:** {}\n",
        snapshot.metrics.rows.len()
    ));
    section.push_str(&format!(
        "- **Evidence Tables:** {}\n\n",
        snapshot.evidence.tables.len()
    ));
    section
}

fn generate_headline_section(snapshot: &Snapshot) -> String {
    let mut section = String::new();
    section.push_str("## Headline Metrics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");

    let rows: [(&str, &str, bool); 8] = [
        ("total_publishers", "Total publishers", false),
        ("active_publishers", "Active publishers", false),
        ("active_ratio", "Active ratio", true),
        ("total_gmv", "Total GMV", false),
        ("gmv_per_active", "GMV per active", false),
        ("top10_share", "Top-10 share", true),
        ("publishers_to_50pct", "Publishers to 50% GMV", false),
        ("approval_rate", "Approval rate", true),
    ];
    for (key, label, as_pct) in rows {
        if let Some(value) = metric(snapshot, key) {
            let formatted = if as_pct {
                fmt_pct(value)
            } else if value.fract() == 0.0 {
                format!("{}", value as i64)
            } else {
                fmt_money(value)
            };
            section.push_str(&format!("| {} | {} |\n", label, formatted));
        }
    }
    section.push('\n');
    section
}

fn generate_concentration_section(snapshot: &Snapshot, config: &ReportConfig) -> String {
    let top: Vec<TopPublisherRow> = table_rows(snapshot, EvidenceTableKey::TopPublishers);
    let pareto: Vec<ParetoPoint> = if config.include_pareto {
        table_rows(snapshot, EvidenceTableKey::Pareto)
    } else {
        Vec::new()
    };

    let mut section = String::new();
    section.push_str("## Concentration\n\n");

    if top.is_empty() {
        section.push_str("No active publishers with revenue in this dataset.\n\n");
        return section;
    }

    section.push_str("### Top Publishers\n\n");
    section.push_str("| # | Publisher | Revenue | Share | Cumulative |\n");
    section.push_str("|---:|:---|---:|---:|---:|\n");
    for row in &top {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.rank,
            row.name,
            fmt_money(row.revenue),
            fmt_pct(row.pct),
            fmt_pct(row.cum_pct)
        ));
    }
    section.push('\n');

    if !pareto.is_empty() {
        section.push_str("### Pareto Curve\n\n");
        section.push_str("| Publishers | GMV |\n");
        section.push_str("|---:|---:|\n");
        for point in &pareto {
            section.push_str(&format!(
                "| {:.1}% | {:.1}% |\n",
                point.publisher_pct, point.gmv_pct
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_mix_section(snapshot: &Snapshot) -> String {
    let buckets: Vec<MixBucket> = table_rows(snapshot, EvidenceTableKey::MixBreakdown);
    if buckets.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Channel Mix\n\n");
    section.push_str("| Bucket | Publishers | GMV | Count Share | GMV Share |\n");
    section.push_str("|:---|---:|---:|---:|---:|\n");
    for bucket in &buckets {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            bucket.key,
            bucket.count,
            fmt_money(bucket.gmv),
            fmt_pct(bucket.count_share),
            fmt_pct(bucket.gmv_share)
        ));
    }
    section.push('\n');
    section
}

fn generate_tier_section(snapshot: &Snapshot) -> String {
    let tiers: Vec<TierSummaryRow> = table_rows(snapshot, EvidenceTableKey::TierSummary);
    if tiers.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Tiers\n\n");
    section.push_str("| Tier | Publishers | GMV | GMV Share | Top Members |\n");
    section.push_str("|:---|---:|---:|---:|:---|\n");
    for tier in &tiers {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            tier.tier.label(),
            tier.count,
            fmt_money(tier.gmv),
            fmt_pct(tier.gmv_share),
            tier.top_members.join(", ")
        ));
    }
    section.push('\n');
    section
}

fn generate_approval_section(snapshot: &Snapshot) -> String {
    let rows: Vec<ApprovalDetailRow> = table_rows(snapshot, EvidenceTableKey::ApprovalDetail);
    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Approval Detail\n\n");
    section.push_str("Publishers with revenue, highest decline rate first.\n\n");
    section.push_str("| Publisher | Revenue | Approved | Declined | Approval | Decline |\n");
    section.push_str("|:---|---:|---:|---:|---:|---:|\n");
    for row in &rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            row.name,
            fmt_money(row.total_revenue),
            fmt_money(row.approved_revenue),
            fmt_money(row.declined_revenue),
            fmt_pct(row.approval_rate),
            fmt_pct(row.decline_rate)
        ));
    }
    section.push('\n');
    section
}

fn generate_actions_section(snapshot: &Snapshot) -> String {
    let tasks: Vec<TaskRow> = table_rows(snapshot, EvidenceTableKey::ActionTimeline);
    if tasks.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Recommended Actions\n\n");
    for task in &tasks {
        let badge = match task.priority {
            TaskPriority::High => "**HIGH**",
            TaskPriority::Medium => "MEDIUM",
        };
        section.push_str(&format!("- {} — {}: {}\n", badge, task.title, task.description));
    }
    section.push('\n');
    section
}
