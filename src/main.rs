//! pubmetrics - affiliate publisher performance analytics
//!
//! A CLI tool that ingests per-publisher performance rows, computes a fixed
//! set of named metrics and chart-ready evidence tables, and publishes them
//! as a versioned snapshot that reports and exports read as ground truth.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, persistence failure, config error)

mod cli;
mod config;
mod errors;
mod evidence;
mod ingest;
mod metrics;
mod models;
mod normalize;
mod pipeline;
mod report;
mod store;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use normalize::FieldMapping;
use pipeline::Pipeline;
use std::path::Path;
use store::SnapshotStore;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("pubmetrics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pubmetrics.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".pubmetrics.toml");

    if path.exists() {
        eprintln!("⚠️  .pubmetrics.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .pubmetrics.toml")?;

    println!("✅ Created .pubmetrics.toml with default settings.");
    println!("   Edit it to customize the store location, tier ranks and thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete workflow: ingest → pipeline → report.
async fn run(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let dataset_id = args.dataset_id();

    // Step 1: Load the input
    let input = args.input.as_ref().expect("validated");
    println!("📥 Loading input: {}", input.display());
    let rows = ingest::load_rows(input)?;

    let mapping = match args.mapping {
        Some(ref path) => {
            info!("Using explicit mapping from {}", path.display());
            Some(ingest::load_mapping(path)?)
        }
        None => None,
    };

    // Handle --dry-run: normalize and summarize without writing
    if args.dry_run {
        return handle_dry_run(&rows, mapping);
    }

    // Step 2: Run the pipeline
    println!("🔬 Recomputing dataset: {}", dataset_id);
    println!("   Store: {}", config.store.dir);

    let store = SnapshotStore::new(&config.store.dir, config.store.keep_versions);
    let pipeline = Pipeline::new(&store, config.metrics_options(), !args.quiet);

    let outcome = pipeline
        .run(&dataset_id, &rows, mapping)
        .await
        .with_context(|| format!("Recompute failed for dataset '{}'", dataset_id))?;

    println!("\n📊 Snapshot published:");
    println!("   Version: {}", outcome.calc_version);
    println!("   Publishers: {}", outcome.record_count);
    println!(
        "   Metrics: {} | Evidence tables: {}",
        outcome.metric_count, outcome.table_count
    );

    // Step 3: Render the report from the stored snapshot
    if args.no_report {
        return Ok(());
    }

    let snapshot = store
        .read_current(&dataset_id)?
        .context("Snapshot vanished after publish")?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&snapshot)?,
        OutputFormat::Markdown => report::generate_markdown_report(&snapshot, &config.report),
    };

    let report_path = Path::new(&config.general.output);
    std::fs::write(report_path, &output)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    println!("\n✅ Report saved to: {}", report_path.display());
    Ok(())
}

/// Handle --dry-run: normalize the rows, print what would be computed, exit.
fn handle_dry_run(rows: &[models::RawRow], mapping: Option<FieldMapping>) -> Result<()> {
    println!("\n🔍 Dry run: normalizing rows (nothing will be written)...\n");

    let mapping =
        mapping.unwrap_or_else(|| FieldMapping::infer(&pipeline::column_names(rows)));

    let records = normalize::normalize_rows(rows, &mapping)?;
    let active = records.iter().filter(|r| r.is_active()).count();
    let gmv: f64 = records.iter().map(|r| r.total_revenue).sum();

    println!("   Raw rows: {}", rows.len());
    println!("   Mapped columns: {}", mapping.len());
    println!("   Publisher records: {}", records.len());
    println!("   Active: {} | Total GMV: {:.2}", active, gmv);

    println!("\n✅ Dry run complete. No snapshot was written.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .pubmetrics.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            tracing::warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
