//! Versioned snapshot store.
//!
//! Each recompute writes a complete new snapshot under a fresh version
//! directory, then flips a `current` pointer file with an atomic rename.
//! Readers resolve the pointer first, so they never observe a half-written
//! snapshot; a failed run leaves an orphan version directory that the next
//! successful prune removes.
//!
//! Layout per dataset:
//!
//! ```text
//! <root>/<dataset_id>/v000001/metrics.json
//! <root>/<dataset_id>/v000001/evidence.json
//! <root>/<dataset_id>/current        (contains "v000001")
//! <root>/<dataset_id>/run.json       (latest run state, best-effort)
//! ```

use crate::errors::PipelineError;
use crate::models::{DatasetRun, EvidenceTable, MetricValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const CURRENT_POINTER: &str = "current";
const METRICS_FILE: &str = "metrics.json";
const EVIDENCE_FILE: &str = "evidence.json";
const RUN_FILE: &str = "run.json";

/// Persisted metric rows for one calc version of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub dataset_id: String,
    pub calc_version: String,
    pub computed_at: DateTime<Utc>,
    pub rows: Vec<MetricValue>,
}

/// Persisted evidence tables for one calc version of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub dataset_id: String,
    pub calc_version: String,
    pub tables: Vec<EvidenceTable>,
}

/// A fully resolved snapshot: the pair of documents the `current` pointer
/// names. This is the read contract for presentation, narrative and export
/// collaborators; they must not introduce numbers absent from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub metrics: MetricsDocument,
    pub evidence: EvidenceDocument,
}

/// File-backed snapshot store rooted at a directory.
pub struct SnapshotStore {
    root: PathBuf,
    /// Versions kept per dataset after a successful write.
    keep_versions: usize,
    /// Per-dataset recompute locks. Two concurrent recomputes of the same
    /// dataset would race version allocation, so the orchestrator holds the
    /// dataset's lock for the whole run.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>, keep_versions: usize) -> Self {
        Self {
            root: root.into(),
            keep_versions: keep_versions.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The recompute lock for a dataset. Runs for different datasets are
    /// independent; runs for the same dataset serialize on this.
    pub fn dataset_lock(&self, dataset_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(dataset_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn dataset_dir(&self, dataset_id: &str) -> PathBuf {
        self.root.join(dataset_id)
    }

    /// Write a complete snapshot as a new version and flip the pointer.
    /// Returns the new calc_version.
    pub fn write_snapshot(
        &self,
        dataset_id: &str,
        metric_rows: Vec<MetricValue>,
        tables: Vec<EvidenceTable>,
    ) -> Result<String, PipelineError> {
        let dataset_dir = self.dataset_dir(dataset_id);
        fs::create_dir_all(&dataset_dir)
            .map_err(|e| PipelineError::persistence_io("creating dataset directory", e))?;

        let version = next_version(&dataset_dir)?;
        let calc_version = format!("v{:06}", version);
        let version_dir = dataset_dir.join(&calc_version);
        fs::create_dir_all(&version_dir)
            .map_err(|e| PipelineError::persistence_io("creating version directory", e))?;

        let metrics = MetricsDocument {
            dataset_id: dataset_id.to_string(),
            calc_version: calc_version.clone(),
            computed_at: Utc::now(),
            rows: metric_rows,
        };
        let evidence = EvidenceDocument {
            dataset_id: dataset_id.to_string(),
            calc_version: calc_version.clone(),
            tables,
        };

        write_json(&version_dir.join(METRICS_FILE), &metrics)?;
        write_json(&version_dir.join(EVIDENCE_FILE), &evidence)?;

        // The new version is complete on disk; make it visible atomically.
        swap_pointer(&dataset_dir, &calc_version)?;
        info!(dataset = dataset_id, version = %calc_version, "snapshot published");

        self.prune(dataset_id, &calc_version);
        Ok(calc_version)
    }

    /// Resolve the current snapshot for a dataset, if one was ever published.
    pub fn read_current(&self, dataset_id: &str) -> Result<Option<Snapshot>, PipelineError> {
        let dataset_dir = self.dataset_dir(dataset_id);
        let pointer = dataset_dir.join(CURRENT_POINTER);
        if !pointer.exists() {
            return Ok(None);
        }

        let calc_version = fs::read_to_string(&pointer)
            .map_err(|e| PipelineError::persistence_io("reading current pointer", e))?
            .trim()
            .to_string();
        let version_dir = dataset_dir.join(&calc_version);

        let metrics: MetricsDocument = read_json(&version_dir.join(METRICS_FILE))?;
        let evidence: EvidenceDocument = read_json(&version_dir.join(EVIDENCE_FILE))?;
        Ok(Some(Snapshot { metrics, evidence }))
    }

    /// List version ids present for a dataset, ascending by version number
    /// (lexicographic order breaks once names stop being equal length).
    pub fn list_versions(&self, dataset_id: &str) -> Result<Vec<String>, PipelineError> {
        let dataset_dir = self.dataset_dir(dataset_id);
        if !dataset_dir.exists() {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = fs::read_dir(&dataset_dir)
            .map_err(|e| PipelineError::persistence_io("listing dataset directory", e))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| parse_version(name).is_some())
            .collect();
        versions.sort_by_key(|name| parse_version(name).unwrap_or(0));
        Ok(versions)
    }

    /// Persist the latest run state for a dataset. Callers treat failures
    /// as best-effort: a lost progress update must not abort the run.
    pub fn write_run(&self, run: &DatasetRun) -> Result<(), PipelineError> {
        let dataset_dir = self.dataset_dir(&run.dataset_id);
        fs::create_dir_all(&dataset_dir)
            .map_err(|e| PipelineError::persistence_io("creating dataset directory", e))?;
        write_json(&dataset_dir.join(RUN_FILE), run)
    }

    /// The latest persisted run state, if any.
    pub fn read_run(&self, dataset_id: &str) -> Result<Option<DatasetRun>, PipelineError> {
        let path = self.dataset_dir(dataset_id).join(RUN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Drop old version directories, keeping the newest `keep_versions` and
    /// always the one the pointer names. Best-effort.
    fn prune(&self, dataset_id: &str, current: &str) {
        let versions = match self.list_versions(dataset_id) {
            Ok(v) => v,
            Err(e) => {
                warn!(dataset = dataset_id, "prune skipped: {}", e);
                return;
            }
        };
        if versions.len() <= self.keep_versions {
            return;
        }

        let cutoff = versions.len() - self.keep_versions;
        for version in &versions[..cutoff] {
            if version == current {
                continue;
            }
            let dir = self.dataset_dir(dataset_id).join(version);
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!(dataset = dataset_id, version = %version, "prune failed: {}", e);
            } else {
                debug!(dataset = dataset_id, version = %version, "pruned old snapshot");
            }
        }
    }
}

/// Next version number: one past the highest existing `vNNNNNN` directory.
/// Scanning (rather than a counter file) keeps orphans from failed runs
/// from ever being reused.
fn next_version(dataset_dir: &Path) -> Result<u64, PipelineError> {
    let mut highest = 0u64;
    let entries = match fs::read_dir(dataset_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(PipelineError::persistence_io("scanning versions", e)),
    };
    for entry in entries.filter_map(|e| e.ok()) {
        if let Some(name) = entry.file_name().to_str() {
            if let Some(n) = parse_version(name) {
                highest = highest.max(n);
            }
        }
    }
    Ok(highest + 1)
}

/// Accepts any `v<digits>` directory name: the `v{:06}` format stops
/// zero-padding past 999999, and those versions must still be listed,
/// pruned and counted.
fn parse_version(name: &str) -> Option<u64> {
    let digits = name.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Write JSON via a temp file and rename, so a crash mid-write never leaves
/// a truncated file at the target path.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let payload = serde_json::to_vec_pretty(value)
        .map_err(|e| PipelineError::persistence(format!("serializing {}: {}", path.display(), e)))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)
        .map_err(|e| PipelineError::persistence_io("writing temp file", e))?;
    fs::rename(&tmp, path)
        .map_err(|e| PipelineError::persistence_io("renaming temp file", e))?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PipelineError> {
    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::persistence_io(&format!("reading {}", path.display()), e))?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::persistence(format!("parsing {}: {}", path.display(), e)))
}

/// Flip the `current` pointer to a fully written version directory.
fn swap_pointer(dataset_dir: &Path, calc_version: &str) -> Result<(), PipelineError> {
    let tmp = dataset_dir.join("current.tmp");
    fs::write(&tmp, calc_version)
        .map_err(|e| PipelineError::persistence_io("writing pointer temp file", e))?;
    fs::rename(&tmp, dataset_dir.join(CURRENT_POINTER))
        .map_err(|e| PipelineError::persistence_io("swapping current pointer", e))?;
    Ok(())
}
