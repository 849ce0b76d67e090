//! Data models for the analytics pipeline.
//!
//! This module contains all the core data structures shared across the
//! normalizer, aggregation engine, evidence builder, snapshot store and
//! run orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// A raw ingested row: source column name mapped to whatever the upstream
/// exporter put in the cell (string, number, bool or null).
pub type RawRow = BTreeMap<String, serde_json::Value>;

/// Canonical per-publisher record, one per dedupe key per dataset.
///
/// Numeric fields default to 0.0; unparsable input is coerced to 0.0 by the
/// normalizer rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublisherRecord {
    /// Upstream publisher identifier, if the source carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    /// Display name of the publisher.
    pub name: String,
    /// Free-form publisher type as ingested (bucketized later by Mix Health).
    pub publisher_type: String,
    pub total_revenue: f64,
    pub total_commission: f64,
    pub orders: f64,
    pub approved_revenue: f64,
    pub pending_revenue: f64,
    pub declined_revenue: f64,
}

impl PublisherRecord {
    /// A publisher is active when it has attributed revenue.
    pub fn is_active(&self) -> bool {
        self.total_revenue > 0.0
    }

    /// Dedupe key: publisher_id when present, otherwise the lowercased name
    /// with whitespace runs collapsed to underscores.
    pub fn dedupe_key(&self) -> String {
        match self.publisher_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => self
                .name
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

/// Closed set of fixed metric keys.
///
/// Per-bucket shares (`{bucket}_share`) are an open-ended family and are
/// carried separately as `(String, f64)` pairs rather than widening this
/// enum into a stringly-typed bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TotalPublishers,
    ActivePublishers,
    ActiveRatio,
    TotalGmv,
    GmvPerActive,
    Top1Share,
    Top3Share,
    Top10Share,
    PublishersTo50Pct,
    ApprovedRevenue,
    PendingRevenue,
    DeclinedRevenue,
    ApprovalRate,
    OverallCpa,
    OverallAov,
    OverallRoi,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TotalPublishers => "total_publishers",
            MetricKey::ActivePublishers => "active_publishers",
            MetricKey::ActiveRatio => "active_ratio",
            MetricKey::TotalGmv => "total_gmv",
            MetricKey::GmvPerActive => "gmv_per_active",
            MetricKey::Top1Share => "top1_share",
            MetricKey::Top3Share => "top3_share",
            MetricKey::Top10Share => "top10_share",
            MetricKey::PublishersTo50Pct => "publishers_to_50pct",
            MetricKey::ApprovedRevenue => "approved_revenue",
            MetricKey::PendingRevenue => "pending_revenue",
            MetricKey::DeclinedRevenue => "declined_revenue",
            MetricKey::ApprovalRate => "approval_rate",
            MetricKey::OverallCpa => "overall_cpa",
            MetricKey::OverallAov => "overall_aov",
            MetricKey::OverallRoi => "overall_roi",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The aggregation module that produced a metric or evidence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    Activation,
    Concentration,
    MixHealth,
    Approval,
    Efficiency,
    Tiering,
    Risk,
}

impl ModuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::Activation => "activation",
            ModuleId::Concentration => "concentration",
            ModuleId::MixHealth => "mix_health",
            ModuleId::Approval => "approval",
            ModuleId::Efficiency => "efficiency",
            ModuleId::Tiering => "tiering",
            ModuleId::Risk => "risk",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One computed metric value, before the snapshot store stamps it with a
/// dataset id and calc_version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Fixed key (`MetricKey::as_str`) or a `{bucket}_share` family key.
    pub metric_key: String,
    pub value_num: f64,
    pub module_id: ModuleId,
}

impl MetricValue {
    pub fn fixed(key: MetricKey, value: f64, module: ModuleId) -> Self {
        Self {
            metric_key: key.as_str().to_string(),
            value_num: value,
            module_id: module,
        }
    }

    /// A metric from the dynamic `{bucket}_share` family.
    pub fn bucket_share(bucket: &str, value: f64) -> Self {
        Self {
            metric_key: format!("{}_share", bucket),
            value_num: value,
            module_id: ModuleId::MixHealth,
        }
    }
}

/// Keys of the evidence tables the builder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTableKey {
    TopPublishers,
    Pareto,
    EfficiencyScatter,
    ApprovalDetail,
    MixBreakdown,
    TierSummary,
    ActionTimeline,
}

impl EvidenceTableKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceTableKey::TopPublishers => "top_publishers",
            EvidenceTableKey::Pareto => "pareto",
            EvidenceTableKey::EfficiencyScatter => "efficiency_scatter",
            EvidenceTableKey::ApprovalDetail => "approval_detail",
            EvidenceTableKey::MixBreakdown => "mix_breakdown",
            EvidenceTableKey::TierSummary => "tier_summary",
            EvidenceTableKey::ActionTimeline => "action_timeline",
        }
    }
}

impl fmt::Display for EvidenceTableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A display-ready evidence table: an ordered array of plain rows serialized
/// as JSON, plus the producing module and the row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceTable {
    pub table_key: EvidenceTableKey,
    pub module_id: ModuleId,
    /// Ordered rows; ordering is significant and reproducible.
    pub data_json: serde_json::Value,
    pub row_count: usize,
}

impl EvidenceTable {
    /// Serialize typed rows into a table.
    ///
    /// A serialization failure degrades to an empty table with a warning;
    /// `row_count` is always taken from the serialized array so it never
    /// disagrees with `data_json`.
    pub fn from_rows<T: Serialize>(
        table_key: EvidenceTableKey,
        module_id: ModuleId,
        rows: &[T],
    ) -> Self {
        let data_json = match serde_json::to_value(rows) {
            Ok(value) => value,
            Err(e) => {
                warn!(table = %table_key, "evidence rows failed to serialize: {}", e);
                serde_json::Value::Array(Vec::new())
            }
        };
        let row_count = data_json.as_array().map(|a| a.len()).unwrap_or(0);
        Self {
            table_key,
            module_id,
            data_json,
            row_count,
        }
    }
}

/// Lifecycle status of a dataset run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Processing => write!(f, "processing"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Progress/state record for one recompute of a dataset.
///
/// Owned exclusively by the orchestrator; everything else only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRun {
    pub dataset_id: String,
    pub status: RunStatus,
    /// 0–100.
    pub processing_progress: u8,
    /// Human-readable label for the current checkpoint.
    pub processing_step: String,
    /// Ids of downstream sections whose inputs are fully written.
    pub sections_ready: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetRun {
    pub fn new(dataset_id: &str) -> Self {
        let now = Utc::now();
        Self {
            dataset_id: dataset_id.to_string(),
            status: RunStatus::Pending,
            processing_progress: 0,
            processing_step: "queued".to_string(),
            sections_ready: Vec::new(),
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Advance to a processing checkpoint.
    pub fn checkpoint(&mut self, progress: u8, step: &str) {
        self.status = RunStatus::Processing;
        self.processing_progress = progress.min(100);
        self.processing_step = step.to_string();
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.processing_progress = 100;
        self.processing_step = "done".to_string();
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: &str) {
        self.status = RunStatus::Error;
        self.error = Some(message.to_string());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Error)
    }
}
