//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// pubmetrics - affiliate publisher performance analytics
///
/// Ingests per-publisher performance rows, computes activation,
/// concentration, mix, approval, efficiency and tiering metrics, and
/// publishes them as a versioned snapshot with chart-ready evidence tables.
///
/// Examples:
///   pubmetrics --input rows.json --dataset q3-network
///   pubmetrics --input rows.json --dataset q3-network --mapping map.json
///   pubmetrics --input rows.json --dataset q3-network --format json
///   pubmetrics --input rows.json --dry-run
///   pubmetrics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Input file: a JSON array of raw rows (column name → value)
    ///
    /// Not required when using --init-config.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Dataset identifier the snapshot is keyed by
    ///
    /// Defaults to the input file stem when omitted.
    #[arg(short, long, value_name = "ID")]
    pub dataset: Option<String>,

    /// Explicit field mapping file (JSON: source column → canonical field)
    ///
    /// When omitted, columns are auto-mapped against the built-in alias table.
    #[arg(short, long, value_name = "FILE")]
    pub mapping: Option<PathBuf>,

    /// Snapshot store root directory
    #[arg(long, value_name = "DIR", env = "PUBMETRICS_STORE")]
    pub store: Option<PathBuf>,

    /// Snapshot versions to keep per dataset
    #[arg(long, value_name = "COUNT")]
    pub keep_versions: Option<usize>,

    /// Report output file path
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Skip report generation; only publish the snapshot
    #[arg(long)]
    pub no_report: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pubmetrics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: normalize the input and print a summary without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .pubmetrics.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The effective dataset id: explicit flag, else the input file stem.
    pub fn dataset_id(&self) -> String {
        if let Some(ref dataset) = self.dataset {
            return dataset.clone();
        }
        self.input
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("default")
            .to_string()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref input) = self.input else {
            return Err("An input file is required".to_string());
        };
        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }

        if let Some(ref mapping) = self.mapping {
            if !mapping.exists() {
                return Err(format!("Mapping file does not exist: {}", mapping.display()));
            }
        }

        if let Some(ref dataset) = self.dataset {
            if dataset.trim().is_empty() {
                return Err("Dataset id must not be empty".to_string());
            }
            // Dataset ids become directory names in the store.
            if dataset.contains(['/', '\\']) || dataset.contains("..") {
                return Err(format!("Dataset id is not a valid name: {}", dataset));
            }
        }

        if let Some(keep) = self.keep_versions {
            if keep == 0 {
                return Err("keep-versions must be at least 1".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
