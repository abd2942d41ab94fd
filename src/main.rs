//! shipmetrics - delivery performance metrics engine
//!
//! A CLI tool that loads order exports, filters them, and reports
//! delivery speed, on-time rates, carrier utilization and geographic
//! distribution for Prime vs Standard shipping.
//!
//! Exit codes:
//!   0 - Success (or no --min-on-time set)
//!   1 - Runtime error (unreadable input, invalid record with --on-invalid fail, etc.)
//!   2 - Overall on-time rate below --min-on-time

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;
mod simulate;
mod store;

use analysis::Engine;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use ingest::{IngestOptions, IngestSummary};
use models::{Carrier, Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use store::OrderStore;
use tracing::{debug, error, info, warn};
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

    // Load configuration before logging, since it can turn on verbose output
    let (config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(&config.general));

    info!("shipmetrics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    let result = match args.generate {
        Some(count) => run_generate(&args, &config, count),
        None => run_report(args, config).await,
    };

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .shipmetrics.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize date formats, report sections, simulation, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Handle --generate: write synthetic orders as CSV.
fn run_generate(args: &Args, config: &Config, count: usize) -> Result<i32> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("simulated_orders.csv"));

    println!(
        "🎲 Generating {} orders (seed {})...",
        count, config.simulate.seed
    );
    let orders = simulate::generate(count, &config.simulate)?;
    simulate::write_csv(&orders, &output)?;

    println!("\n✅ Wrote {} orders to: {}", orders.len(), output.display());
    Ok(0)
}

/// Run the ingest, query and report workflow. Returns exit code (0 or 2).
async fn run_report(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Load every input into the store
    let inputs: Vec<String> = args.input.iter().map(|p| p.display().to_string()).collect();
    println!("📥 Loading orders from: {}", inputs.join(", "));

    let options = IngestOptions {
        show_progress: !args.quiet,
        ..IngestOptions::from(&config.ingest)
    };
    let store = Arc::new(OrderStore::new());
    let ingest_summary = ingest::load_inputs(&args.input, store.clone(), &options)
        .await
        .context("Failed to load orders")?;

    if store.is_empty() {
        warn!("No valid orders were loaded");
    }

    // Handle --validate-only: print the ingestion summary and exit
    if args.validate_only {
        print_ingest_summary(&ingest_summary);
        println!("\n✅ Validation complete. No report was written.");
        return Ok(0);
    }

    // Step 2: Query the engine
    let filter = args.filter_context();
    info!("Filter: {}", filter.describe());

    let engine = Engine::new(store.clone(), &config.engine);
    let metrics = engine.query(&filter);

    for warning in &metrics.warnings {
        warn!("{}", warning);
    }

    // Step 3: Build the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            inputs,
            generated_at: Utc::now(),
            filter: filter.describe(),
            records_loaded: store.len(),
            ingest: ingest_summary,
            duration_seconds: duration,
        },
        metrics,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let metrics = &report.metrics;
    let prime = &metrics.service_levels.prime;
    let standard = &metrics.service_levels.standard;

    println!("\n📊 Delivery Summary:");
    if metrics.is_empty() {
        println!("   No orders match the active filter.");
    } else {
        println!("   Orders: {}", metrics.total_orders);
        println!(
            "   - Prime: {} orders | {:.1} days avg | {:.1}% on time",
            prime.orders, prime.avg_delivery_days, prime.on_time_pct
        );
        println!(
            "   - Standard: {} orders | {:.1} days avg | {:.1}% on time",
            standard.orders, standard.avg_delivery_days, standard.on_time_pct
        );
        println!(
            "   AMZL share: {:.1}%",
            metrics.carrier_share(Carrier::Amzl)
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Report complete! Saved to: {}",
        output_path.display()
    );

    // Check --min-on-time threshold
    if let Some(threshold) = args.min_on_time {
        let on_time = metrics.overall_on_time_pct();
        if on_time < threshold {
            eprintln!(
                "\n⛔ On-time rate {:.1}% is below the {:.1}% threshold. Failing (exit code 2).",
                on_time, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

fn print_ingest_summary(summary: &IngestSummary) {
    println!("\n🔍 Ingestion Summary:");
    println!("   Files: {}", summary.files);
    println!("   Rows: {}", summary.rows);
    println!("   Accepted: {}", summary.accepted);
    println!("   Rejected: {}", summary.rejected);
    println!("   Duplicates: {}", summary.duplicates);
}

/// Load configuration from file or use defaults, then apply CLI overrides.
///
/// Returns the config and the file it came from, if any. Runs before
/// logging is set up, so problems are reported on stderr.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) = match args.config {
        // Try explicit config path
        Some(ref config_path) => (Config::load(config_path)?, Some(config_path.clone())),
        // Try default location
        None => match Config::load_default() {
            Ok(Some(config)) => (config, Some(PathBuf::from(CONFIG_FILE_NAME))),
            Ok(None) => (Config::default(), None),
            Err(e) => {
                eprintln!("⚠️  Failed to load config: {:#}. Using defaults.", e);
                (Config::default(), None)
            }
        },
    };

    config.merge_with_args(args);
    Ok((config, source))
}
