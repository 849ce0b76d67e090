//! Run orchestrator.
//!
//! Sequences normalize → aggregate → build evidence → write snapshot for
//! one dataset, owning the [`DatasetRun`] state machine exclusively. The
//! run serializes on the store's per-dataset lock; runs for different
//! datasets proceed concurrently.

use crate::errors::PipelineError;
use crate::evidence;
use crate::metrics::{self, MetricsOptions};
use crate::models::{DatasetRun, RawRow};
use crate::normalize::{self, FieldMapping};
use crate::store::SnapshotStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

/// Section ids appended to `sections_ready` once the snapshot is visible.
const SECTIONS: [&str; 6] = [
    "overview",
    "concentration",
    "mix",
    "approval",
    "efficiency",
    "actions",
];

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub calc_version: String,
    pub record_count: usize,
    pub metric_count: usize,
    pub table_count: usize,
}

/// Orchestrates recomputes against one snapshot store.
pub struct Pipeline<'a> {
    store: &'a SnapshotStore,
    options: MetricsOptions,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a SnapshotStore, options: MetricsOptions, show_progress: bool) -> Self {
        Self {
            store,
            options,
            show_progress,
        }
    }

    /// Run one full recompute for a dataset.
    ///
    /// On any failure the run transitions to error with the message; rows
    /// already written into the in-progress version directory are not
    /// rolled back, but they are never pointed at by `current` either.
    pub async fn run(
        &self,
        dataset_id: &str,
        rows: &[RawRow],
        explicit_mapping: Option<FieldMapping>,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Serialize recomputes per dataset. The delete-free versioned store
        // makes readers safe, but version allocation still needs a single
        // writer at a time.
        let lock = self.store.dataset_lock(dataset_id);
        let _guard = lock.lock().await;

        let mut run = DatasetRun::new(dataset_id);
        self.persist_run(&run);

        let progress = self.progress_bar(dataset_id);

        let outcome = self
            .run_stages(dataset_id, rows, explicit_mapping, &mut run, &progress)
            .await;

        match &outcome {
            Ok(result) => {
                run.complete();
                self.persist_run(&run);
                progress.finish_with_message("done");
                info!(
                    dataset = dataset_id,
                    version = %result.calc_version,
                    records = result.record_count,
                    "pipeline completed"
                );
            }
            Err(e) => {
                run.fail(&e.to_string());
                self.persist_run(&run);
                progress.abandon_with_message("failed");
                error!(dataset = dataset_id, "pipeline failed: {}", e);
            }
        }

        outcome
    }

    async fn run_stages(
        &self,
        dataset_id: &str,
        rows: &[RawRow],
        explicit_mapping: Option<FieldMapping>,
        run: &mut DatasetRun,
        progress: &ProgressBar,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.checkpoint(run, progress, 10, "normalizing");
        let mapping = match explicit_mapping {
            Some(mapping) => mapping,
            None => FieldMapping::infer(&column_names(rows)),
        };
        let records = normalize::normalize_rows(rows, &mapping)?;

        self.checkpoint(run, progress, 35, "aggregating");
        let metrics = metrics::compute_all(&records, &self.options);
        let metric_rows = metrics.metric_rows();

        self.checkpoint(run, progress, 70, "building evidence");
        let tables = evidence::build_all(&records, &metrics);

        self.checkpoint(run, progress, 90, "writing snapshot");
        let table_count = tables.len();
        let metric_count = metric_rows.len();
        let calc_version = self.store.write_snapshot(dataset_id, metric_rows, tables)?;

        // Denormalized convenience list for downstream section rendering;
        // best-effort by contract.
        for section in SECTIONS {
            run.sections_ready.push(section.to_string());
        }

        Ok(PipelineOutcome {
            calc_version,
            record_count: records.len(),
            metric_count,
            table_count,
        })
    }

    fn checkpoint(&self, run: &mut DatasetRun, progress: &ProgressBar, pct: u8, step: &str) {
        run.checkpoint(pct, step);
        self.persist_run(run);
        progress.set_position(pct as u64);
        progress.set_message(step.to_string());
    }

    /// Run-state writes are secondary: log and continue on failure.
    fn persist_run(&self, run: &DatasetRun) {
        if let Err(e) = self.store.write_run(run) {
            warn!(dataset = %run.dataset_id, "run state write failed: {}", e);
        }
    }

    fn progress_bar(&self, dataset_id: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template("{prefix} [{bar:30}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_prefix(dataset_id.to_string());
        pb
    }
}

/// Distinct source column names across the raw rows, in first-seen order.
pub fn column_names(rows: &[RawRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.keys() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn raw_row(name: &str, revenue: &str, approved: &str) -> RawRow {
        [
            ("Publisher Name".to_string(), json!(name)),
            ("Revenue".to_string(), json!(revenue)),
            ("Approved".to_string(), json!(approved)),
        ]
        .into_iter()
        .collect()
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            raw_row("Alpha", "$100.00", "80"),
            raw_row("Beta", "0", "0"),
            raw_row("Gamma", "50", "50"),
        ]
    }

    #[tokio::test]
    async fn test_full_run_publishes_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), 5);
        let pipeline = Pipeline::new(&store, MetricsOptions::default(), false);

        let outcome = pipeline.run("ds-1", &sample_rows(), None).await.unwrap();
        assert_eq!(outcome.record_count, 3);
        assert_eq!(outcome.table_count, 7);

        let snapshot = store.read_current("ds-1").unwrap().unwrap();
        let gmv = snapshot
            .metrics
            .rows
            .iter()
            .find(|r| r.metric_key == "total_gmv")
            .unwrap();
        assert_eq!(gmv.value_num, 150.0);
        let rate = snapshot
            .metrics
            .rows
            .iter()
            .find(|r| r.metric_key == "approval_rate")
            .unwrap();
        assert!((rate.value_num - 130.0 / 150.0).abs() < 1e-9);

        let run = store.read_run("ds-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.processing_progress, 100);
        assert!(run.sections_ready.contains(&"concentration".to_string()));
    }

    #[tokio::test]
    async fn test_non_finite_revenue_publishes_readable_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), 5);
        let pipeline = Pipeline::new(&store, MetricsOptions::default(), false);

        // An "inf" cell coerces to 0, so the published metrics stay finite
        // and the snapshot JSON reads back.
        let mut rows = sample_rows();
        rows.push(raw_row("Delta", "inf", "0"));
        pipeline.run("ds-inf", &rows, None).await.unwrap();

        let snapshot = store.read_current("ds-inf").unwrap().unwrap();
        assert!(snapshot.metrics.rows.iter().all(|r| r.value_num.is_finite()));
        let gmv = snapshot
            .metrics
            .rows
            .iter()
            .find(|r| r.metric_key == "total_gmv")
            .unwrap();
        assert_eq!(gmv.value_num, 150.0);
    }

    #[tokio::test]
    async fn test_unusable_input_flips_run_to_error() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), 5);
        let pipeline = Pipeline::new(&store, MetricsOptions::default(), false);

        // Rows with no resolvable identity columns at all.
        let rows = vec![[("junk".to_string(), json!("x"))].into_iter().collect()];
        let err = pipeline.run("ds-bad", &rows, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));

        let run = store.read_run("ds-bad").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert!(run.error.is_some());
        // No snapshot was ever published.
        assert!(store.read_current("ds-bad").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent_on_values() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), 5);
        let pipeline = Pipeline::new(&store, MetricsOptions::default(), false);

        let first = pipeline.run("ds-1", &sample_rows(), None).await.unwrap();
        let snap1 = store.read_current("ds-1").unwrap().unwrap();
        let second = pipeline.run("ds-1", &sample_rows(), None).await.unwrap();
        let snap2 = store.read_current("ds-1").unwrap().unwrap();

        assert_ne!(first.calc_version, second.calc_version);

        // Same values and row counts, ignoring calc_version and timestamps.
        let values1: Vec<(String, f64)> = snap1
            .metrics
            .rows
            .iter()
            .map(|r| (r.metric_key.clone(), r.value_num))
            .collect();
        let values2: Vec<(String, f64)> = snap2
            .metrics
            .rows
            .iter()
            .map(|r| (r.metric_key.clone(), r.value_num))
            .collect();
        assert_eq!(values1, values2);

        let counts1: Vec<usize> = snap1.evidence.tables.iter().map(|t| t.row_count).collect();
        let counts2: Vec<usize> = snap2.evidence.tables.iter().map(|t| t.row_count).collect();
        assert_eq!(counts1, counts2);
    }

    #[tokio::test]
    async fn test_concurrent_runs_on_one_dataset_serialize() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(SnapshotStore::new(dir.path(), 10));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let pipeline = Pipeline::new(&store, MetricsOptions::default(), false);
                pipeline.run("ds-shared", &sample_rows(), None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Four distinct versions, pointer at the highest.
        let versions = store.list_versions("ds-shared").unwrap();
        assert_eq!(versions.len(), 4);
        let snapshot = store.read_current("ds-shared").unwrap().unwrap();
        assert_eq!(snapshot.metrics.calc_version, *versions.last().unwrap());
    }

    #[test]
    fn test_column_names_first_seen_order() {
        let rows = vec![
            raw_row("Alpha", "1", "1"),
            [("Extra".to_string(), json!("x"))].into_iter().collect(),
        ];
        let columns = column_names(&rows);
        assert!(columns.contains(&"Publisher Name".to_string()));
        assert!(columns.contains(&"Extra".to_string()));
    }
}
