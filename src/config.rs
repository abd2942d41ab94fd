//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.shipmetrics.toml` files.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".shipmetrics.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Aggregation engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Synthetic data settings.
    #[serde(default)]
    pub simulate: SimulateConfig,
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
    "delivery_report.md".to_string()
}

/// What to do with a record that fails validation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRecordPolicy {
    /// Log the rejection and keep going.
    #[default]
    Skip,
    /// Abort ingestion on the first invalid record.
    Fail,
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// `chrono` format string for date columns.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Policy for records that fail validation.
    #[serde(default)]
    pub on_invalid: InvalidRecordPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            on_invalid: InvalidRecordPolicy::Skip,
        }
    }
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

/// Aggregation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Snapshots with at least this many records are reduced in parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

fn default_parallel_threshold() -> usize {
    50_000
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of cities shown in the city distribution table.
    #[serde(default = "default_top_cities")]
    pub top_cities: usize,

    /// Decimal places for percentages and averages (rounded half to even).
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Include the delivery-day histograms.
    #[serde(default = "default_true")]
    pub include_histograms: bool,

    /// Include the state distribution table.
    #[serde(default = "default_true")]
    pub include_states: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_cities: default_top_cities(),
            decimals: default_decimals(),
            include_histograms: true,
            include_states: true,
        }
    }
}

fn default_top_cities() -> usize {
    10
}

fn default_decimals() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Synthetic order generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateConfig {
    /// RNG seed; the same seed always yields the same orders.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// First possible order date.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// Last possible order date.
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,

    /// Fraction of orders placed by Prime members.
    #[serde(default = "default_prime_ratio")]
    pub prime_ratio: f64,

    #[serde(default = "default_prime_days_mean")]
    pub prime_days_mean: f64,

    #[serde(default = "default_prime_days_std_dev")]
    pub prime_days_std_dev: f64,

    #[serde(default = "default_standard_days_mean")]
    pub standard_days_mean: f64,

    #[serde(default = "default_standard_days_std_dev")]
    pub standard_days_std_dev: f64,

    /// Probability that a Prime delivery slips past its promise.
    #[serde(default = "default_prime_delay_probability")]
    pub prime_delay_probability: f64,

    /// Probability that a Standard delivery slips past its promise.
    #[serde(default = "default_standard_delay_probability")]
    pub standard_delay_probability: f64,

    /// Maximum slip, in days, of a delayed delivery.
    #[serde(default = "default_max_delay_days")]
    pub max_delay_days: i64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            prime_ratio: default_prime_ratio(),
            prime_days_mean: default_prime_days_mean(),
            prime_days_std_dev: default_prime_days_std_dev(),
            standard_days_mean: default_standard_days_mean(),
            standard_days_std_dev: default_standard_days_std_dev(),
            prime_delay_probability: default_prime_delay_probability(),
            standard_delay_probability: default_standard_delay_probability(),
            max_delay_days: default_max_delay_days(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}

fn default_prime_ratio() -> f64 {
    0.70
}

fn default_prime_days_mean() -> f64 {
    1.5
}

fn default_prime_days_std_dev() -> f64 {
    0.5
}

fn default_standard_days_mean() -> f64 {
    6.0
}

fn default_standard_days_std_dev() -> f64 {
    1.5
}

fn default_prime_delay_probability() -> f64 {
    0.05
}

fn default_standard_delay_probability() -> f64 {
    0.20
}

fn default_max_delay_days() -> i64 {
    2
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
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(policy) = args.on_invalid {
            self.ingest.on_invalid = policy;
        }
        if let Some(ref format) = args.date_format {
            self.ingest.date_format = format.clone();
        }

        if args.parallel {
            self.engine.parallel_threshold = 0;
        }

        if let Some(top) = args.top_cities {
            self.report.top_cities = top;
        }

        if let Some(seed) = args.seed {
            self.simulate.seed = seed;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
