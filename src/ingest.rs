//! Input loading: the file-based interface to the ingestion collaborator.
//!
//! Raw rows arrive as a JSON array of objects (source column name → raw
//! value). An explicit field mapping, when supplied, is a JSON object of
//! `source column → canonical field name` pairs.

use crate::models::RawRow;
use crate::normalize::FieldMapping;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Load raw rows from a JSON file.
pub fn load_rows(path: &Path) -> Result<Vec<RawRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let rows: Vec<RawRow> = serde_json::from_str(&content)
        .with_context(|| format!("Input must be a JSON array of objects: {}", path.display()))?;

    if rows.is_empty() {
        bail!("Input file contains no rows: {}", path.display());
    }

    debug!("loaded {} raw rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Load an explicit field mapping from a JSON file.
pub fn load_mapping(path: &Path) -> Result<FieldMapping> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;

    let pairs: BTreeMap<String, String> = serde_json::from_str(&content).with_context(|| {
        format!(
            "Mapping must be a JSON object of source column to canonical field: {}",
            path.display()
        )
    })?;

    let mapping = FieldMapping::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .with_context(|| format!("Invalid mapping file: {}", path.display()))?;

    debug!("loaded explicit mapping with {} columns", mapping.len());
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_rows() {
        let file = temp_json(r#"[{"Publisher": "Alpha", "Revenue": "$1,000"}]"#);
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Publisher"], serde_json::json!("Alpha"));
    }

    #[test]
    fn test_load_rows_rejects_empty_array() {
        let file = temp_json("[]");
        assert!(load_rows(file.path()).is_err());
    }

    #[test]
    fn test_load_rows_rejects_non_array() {
        let file = temp_json(r#"{"not": "an array"}"#);
        assert!(load_rows(file.path()).is_err());
    }

    #[test]
    fn test_load_mapping() {
        let file = temp_json(r#"{"Pub": "publisher_name", "Rev": "total_revenue"}"#);
        let mapping = load_mapping(file.path()).unwrap();
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_load_mapping_rejects_unknown_field() {
        let file = temp_json(r#"{"Pub": "nonsense_field"}"#);
        assert!(load_mapping(file.path()).is_err());
    }
}
