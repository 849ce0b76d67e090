//! Record normalization.
//!
//! Turns raw ingested rows (source column name → raw value) into canonical
//! [`PublisherRecord`]s: resolves a field mapping (explicit or auto-inferred
//! from a fixed alias table), coerces numeric values, drops rows with no
//! resolvable identity, and dedupes with latest-wins semantics.

use crate::errors::PipelineError;
use crate::models::{PublisherRecord, RawRow};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// The canonical fields a source column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    PublisherId,
    PublisherName,
    TotalRevenue,
    TotalCommission,
    Orders,
    ApprovedRevenue,
    PendingRevenue,
    DeclinedRevenue,
    PublisherType,
}

impl CanonicalField {
    /// All canonical fields, in alias-resolution priority order.
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::PublisherId,
        CanonicalField::PublisherName,
        CanonicalField::TotalRevenue,
        CanonicalField::TotalCommission,
        CanonicalField::Orders,
        CanonicalField::ApprovedRevenue,
        CanonicalField::PendingRevenue,
        CanonicalField::DeclinedRevenue,
        CanonicalField::PublisherType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::PublisherId => "publisher_id",
            CanonicalField::PublisherName => "publisher_name",
            CanonicalField::TotalRevenue => "total_revenue",
            CanonicalField::TotalCommission => "total_commission",
            CanonicalField::Orders => "orders",
            CanonicalField::ApprovedRevenue => "approved_revenue",
            CanonicalField::PendingRevenue => "pending_revenue",
            CanonicalField::DeclinedRevenue => "declined_revenue",
            CanonicalField::PublisherType => "publisher_type",
        }
    }

    /// Parse a canonical field name (as used in explicit mapping files).
    pub fn from_name(name: &str) -> Option<Self> {
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == name.trim().to_lowercase())
    }

    /// Known source-column aliases for this field. Matching normalizes
    /// case and whitespace, so "Publisher Name" and "publisher_name" both
    /// resolve through the same entry.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::PublisherId => &[
                "publisher_id",
                "affiliate_id",
                "partner_id",
                "id",
            ],
            CanonicalField::PublisherName => &[
                "publisher_name",
                "publisher",
                "affiliate_name",
                "affiliate",
                "partner_name",
                "partner",
                "site_name",
                "site",
                "name",
            ],
            CanonicalField::TotalRevenue => &[
                "total_revenue",
                "revenue",
                "gmv",
                "total_sales",
                "sales",
                "sale_amount",
                "order_value",
                "turnover",
            ],
            CanonicalField::TotalCommission => &[
                "total_commission",
                "commission",
                "commission_amount",
                "payout",
                "cost",
            ],
            CanonicalField::Orders => &[
                "orders",
                "order_count",
                "transactions",
                "conversions",
                "sales_count",
                "num_orders",
            ],
            CanonicalField::ApprovedRevenue => &[
                "approved_revenue",
                "approved_sales",
                "approved_amount",
                "confirmed_revenue",
                "approved",
            ],
            CanonicalField::PendingRevenue => &[
                "pending_revenue",
                "pending_sales",
                "pending_amount",
                "pending",
            ],
            CanonicalField::DeclinedRevenue => &[
                "declined_revenue",
                "declined_sales",
                "rejected_revenue",
                "cancelled_revenue",
                "declined",
                "rejected",
            ],
            CanonicalField::PublisherType => &[
                "publisher_type",
                "promotion_type",
                "promotional_method",
                "business_model",
                "channel",
                "category",
                "type",
            ],
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved mapping from source column name to canonical field.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    columns: HashMap<String, CanonicalField>,
}

impl FieldMapping {
    /// Build a mapping from explicit `source column → canonical field name`
    /// pairs. Unknown canonical names are rejected.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut columns = HashMap::new();
        for (source, canonical) in pairs {
            let field = CanonicalField::from_name(canonical.as_ref()).ok_or_else(|| {
                PipelineError::input(format!(
                    "unknown canonical field '{}' for column '{}'",
                    canonical.as_ref(),
                    source.as_ref()
                ))
            })?;
            columns.insert(source.as_ref().to_string(), field);
        }
        Ok(Self { columns })
    }

    /// Auto-infer a mapping by matching source column names against the
    /// alias table. Matching is case-insensitive and treats whitespace and
    /// underscores as equivalent, so "Promotion Type" resolves through the
    /// `promotion_type` alias. The first column matching an alias wins;
    /// one source column per canonical field.
    pub fn infer(columns: &[String]) -> Self {
        let mut resolved: HashMap<String, CanonicalField> = HashMap::new();
        let normalized: Vec<String> = columns.iter().map(|c| normalize_column(c)).collect();

        for field in CanonicalField::ALL {
            'aliases: for alias in field.aliases() {
                for (column, norm) in columns.iter().zip(&normalized) {
                    if norm == alias {
                        resolved.insert(column.clone(), field);
                        break 'aliases;
                    }
                }
            }
        }

        debug!("inferred mapping for {} columns", resolved.len());
        Self { columns: resolved }
    }

    pub fn field_for(&self, column: &str) -> Option<CanonicalField> {
        self.columns.get(column).copied()
    }

    /// The source column mapped to a given canonical field, if any.
    pub fn column_for(&self, field: CanonicalField) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, f)| **f == field)
            .map(|(column, _)| column.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Lowercase a column name and collapse whitespace runs to underscores, so
/// spaced and underscored spellings compare equal during inference.
fn normalize_column(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Coerce a raw cell into a number.
///
/// Strings are stripped of currency symbols, thousands separators, percent
/// signs and whitespace before parsing; anything unparsable becomes 0.0.
/// Negative values pass through as parsed. Non-finite parses ("inf",
/// "nan") are treated as unparsable: a record must never carry a value
/// that the downstream divisions and the JSON snapshot cannot represent.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '%') && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return 0.0;
            }
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Coerce a raw cell into a trimmed string; null becomes empty.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Normalize raw rows into canonical publisher records.
///
/// Rows without a resolvable publisher name or id are dropped. Records with
/// the same dedupe key collapse latest-wins (whole-record replacement, no
/// field-level merge); output order is the first-seen position of each key,
/// which keeps recomputes deterministic.
pub fn normalize_rows(
    rows: &[RawRow],
    mapping: &FieldMapping,
) -> Result<Vec<PublisherRecord>, PipelineError> {
    if mapping.is_empty() {
        return Err(PipelineError::input(
            "field mapping is empty: no source column matched any known alias",
        ));
    }

    let mut records: Vec<PublisherRecord> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let record = build_record(row, mapping);

        if record.name.is_empty() {
            dropped += 1;
            continue;
        }

        let key = record.dedupe_key();
        match index_by_key.get(&key) {
            // Latest wins: replace in place so first-seen order is kept.
            Some(&at) => records[at] = record,
            None => {
                index_by_key.insert(key, records.len());
                records.push(record);
            }
        }
    }

    if dropped > 0 {
        warn!("dropped {} rows without a resolvable publisher identity", dropped);
    }

    if records.is_empty() {
        return Err(PipelineError::input(
            "no usable publisher records after normalization",
        ));
    }

    debug!("normalized {} rows into {} records", rows.len(), records.len());
    Ok(records)
}

fn build_record(row: &RawRow, mapping: &FieldMapping) -> PublisherRecord {
    let mut record = PublisherRecord::default();

    for (column, value) in row {
        let Some(field) = mapping.field_for(column) else {
            continue;
        };
        match field {
            CanonicalField::PublisherId => {
                let id = coerce_string(value);
                if !id.is_empty() {
                    record.publisher_id = Some(id);
                }
            }
            CanonicalField::PublisherName => record.name = coerce_string(value),
            CanonicalField::PublisherType => record.publisher_type = coerce_string(value),
            CanonicalField::TotalRevenue => record.total_revenue = coerce_number(value),
            CanonicalField::TotalCommission => record.total_commission = coerce_number(value),
            CanonicalField::Orders => record.orders = coerce_number(value),
            CanonicalField::ApprovedRevenue => record.approved_revenue = coerce_number(value),
            CanonicalField::PendingRevenue => record.pending_revenue = coerce_number(value),
            CanonicalField::DeclinedRevenue => record.declined_revenue = coerce_number(value),
        }
    }

    // A row that only carries an id is still identifiable.
    if record.name.is_empty() {
        if let Some(ref id) = record.publisher_id {
            record.name = id.clone();
        }
    }

    record
}
