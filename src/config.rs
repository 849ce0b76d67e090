//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pubmetrics.toml` files.

use crate::metrics::MetricsOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Snapshot store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Tiering rank cutoffs.
    #[serde(default)]
    pub tiering: TieringConfig,

    /// Risk thresholds driving task priorities.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "pubmetrics_report.md".to_string()
}

/// Snapshot store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for dataset snapshots.
    #[serde(default = "default_store_dir")]
    pub dir: String,

    /// Snapshot versions kept per dataset after a successful write.
    #[serde(default = "default_keep_versions")]
    pub keep_versions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            keep_versions: default_keep_versions(),
        }
    }
}

fn default_store_dir() -> String {
    ".pubmetrics".to_string()
}

fn default_keep_versions() -> usize {
    5
}

/// Tiering rank cutoffs (1-based, inclusive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieringConfig {
    #[serde(default = "default_tier1_rank")]
    pub tier1_rank: usize,

    #[serde(default = "default_tier2_rank")]
    pub tier2_rank: usize,

    /// Members listed per tier in the tier summary.
    #[serde(default = "default_top_members")]
    pub top_members: usize,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            tier1_rank: default_tier1_rank(),
            tier2_rank: default_tier2_rank(),
            top_members: default_top_members(),
        }
    }
}

fn default_tier1_rank() -> usize {
    10
}

fn default_tier2_rank() -> usize {
    50
}

fn default_top_members() -> usize {
    5
}

/// Risk thresholds: crossing one escalates the matching remediation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_min_active_ratio")]
    pub min_active_ratio: f64,

    #[serde(default = "default_max_top10_share")]
    pub max_top10_share: f64,

    #[serde(default = "default_min_approval_rate")]
    pub min_approval_rate: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_active_ratio: default_min_active_ratio(),
            max_top10_share: default_max_top10_share(),
            min_approval_rate: default_min_approval_rate(),
        }
    }
}

fn default_min_active_ratio() -> f64 {
    0.4
}

fn default_max_top10_share() -> f64 {
    0.5
}

fn default_min_approval_rate() -> f64 {
    0.85
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the pareto curve table in markdown output.
    #[serde(default = "default_true")]
    pub include_pareto: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_pareto: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".pubmetrics.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref store) = args.store {
            self.store.dir = store.display().to_string();
        }
        if let Some(keep) = args.keep_versions {
            self.store.keep_versions = keep;
        }
        if let Some(ref output) = args.report {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Tunables the aggregation engine needs, as one flat options struct.
    pub fn metrics_options(&self) -> MetricsOptions {
        MetricsOptions {
            tier1_rank: self.tiering.tier1_rank,
            tier2_rank: self.tiering.tier2_rank,
            tier_top_members: self.tiering.top_members,
            min_active_ratio: self.thresholds.min_active_ratio,
            max_top10_share: self.thresholds.max_top10_share,
            min_approval_rate: self.thresholds.min_approval_rate,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.dir, ".pubmetrics");
        assert_eq!(config.tiering.tier1_rank, 10);
        assert_eq!(config.thresholds.min_approval_rate, 0.85);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "weekly_report.md"
verbose = true

[store]
dir = "/var/lib/pubmetrics"
keep_versions = 3

[tiering]
tier1_rank = 5

[thresholds]
min_active_ratio = 0.5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "weekly_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.store.dir, "/var/lib/pubmetrics");
        assert_eq!(config.store.keep_versions, 3);
        assert_eq!(config.tiering.tier1_rank, 5);
        // Unset sections keep their defaults.
        assert_eq!(config.tiering.tier2_rank, 50);
        assert_eq!(config.thresholds.min_active_ratio, 0.5);
        assert_eq!(config.thresholds.max_top10_share, 0.5);
    }

    #[test]
    fn test_metrics_options_mapping() {
        let mut config = Config::default();
        config.tiering.tier1_rank = 7;
        config.thresholds.max_top10_share = 0.6;

        let options = config.metrics_options();
        assert_eq!(options.tier1_rank, 7);
        assert_eq!(options.max_top10_share, 0.6);
        assert_eq!(options.tier2_rank, 50);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[thresholds]"));
    }
}
