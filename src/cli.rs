//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::FilterContext;
use crate::config::{GeneralConfig, InvalidRecordPolicy};
use crate::models::{Carrier, ServiceLevel};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// shipmetrics - delivery performance metrics for Prime vs Standard orders
///
/// Load order exports (CSV or JSON), filter them by state, carrier,
/// service level and order date, and report delivery speed, on-time
/// rates, carrier utilization and geographic distribution.
///
/// Examples:
///   shipmetrics --input orders.csv
///   shipmetrics --input exports/ --state CA,TX --carrier AMZL --format json
///   shipmetrics --input orders.csv --from 2024-01-01 --to 2024-03-31
///   shipmetrics --generate 10000 --seed 7 --output simulated_orders.csv
///   shipmetrics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Order files or directories to load
    ///
    /// Directories are searched recursively for .csv and .json files.
    /// Not required when using --init-config or --generate.
    #[arg(
        short,
        long,
        value_name = "PATH",
        num_args = 1..,
        required_unless_present_any = ["init_config", "generate"]
    )]
    pub input: Vec<PathBuf>,

    /// Only include orders shipped to these states (comma-separated)
    ///
    /// Example: --state CA,TX,NY
    #[arg(long, value_name = "STATES", value_delimiter = ',')]
    pub state: Option<Vec<String>>,

    /// Only include orders handled by these carriers (comma-separated)
    ///
    /// Values: AMZL, UPS, USPS, FedEx
    #[arg(long, value_name = "CARRIERS", value_delimiter = ',', value_parser = parse_carrier)]
    pub carrier: Option<Vec<Carrier>>,

    /// Only include these service levels (comma-separated)
    ///
    /// Values: prime, standard
    #[arg(long, value_name = "LEVELS", value_delimiter = ',', value_parser = parse_service_level)]
    pub service_level: Option<Vec<ServiceLevel>>,

    /// Only include orders placed on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Only include orders placed on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Output file path for the report (or the generated CSV)
    ///
    /// Defaults to delivery_report.md, or simulated_orders.csv with --generate
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .shipmetrics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of cities shown in the major cities table
    #[arg(long, value_name = "COUNT")]
    pub top_cities: Option<usize>,

    /// Always use the parallel reduction, regardless of input size
    #[arg(long)]
    pub parallel: bool,

    /// What to do with records that fail validation (skip, fail)
    #[arg(long, value_name = "POLICY")]
    pub on_invalid: Option<InvalidRecordPolicy>,

    /// chrono format string for date columns
    ///
    /// Example: --date-format %m/%d/%Y
    #[arg(long, value_name = "FORMAT", env = "SHIPMETRICS_DATE_FORMAT")]
    pub date_format: Option<String>,

    /// Fail if the overall on-time rate is below this percentage
    ///
    /// Useful for CI pipelines. Exit code 2 when the rate is below the threshold.
    #[arg(long, value_name = "PCT")]
    pub min_on_time: Option<f64>,

    /// Validate the inputs and print the ingestion summary without reporting
    #[arg(long)]
    pub validate_only: bool,

    /// Write COUNT synthetic orders as CSV instead of reporting
    #[arg(long, value_name = "COUNT", conflicts_with = "validate_only")]
    pub generate: Option<usize>,

    /// Seed for --generate
    #[arg(long, value_name = "SEED", requires = "generate")]
    pub seed: Option<u64>,

    /// Generate a default .shipmetrics.toml configuration file
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

fn parse_carrier(value: &str) -> Result<Carrier, String> {
    value.parse()
}

fn parse_service_level(value: &str) -> Result<ServiceLevel, String> {
    value.parse()
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(count) = self.generate {
            if count == 0 {
                return Err("--generate needs at least 1 order".to_string());
            }
            return Ok(());
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {} is after --to {}", from, to));
            }
        }

        if let Some(pct) = self.min_on_time {
            if !(0.0..=100.0).contains(&pct) {
                return Err("--min-on-time must be between 0 and 100".to_string());
            }
        }

        if self.top_cities == Some(0) {
            return Err("--top-cities must be at least 1".to_string());
        }

        for path in &self.input {
            if !path.exists() {
                return Err(format!("Input does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity flags and the config file.
    ///
    /// `--quiet` wins over a config file that enables verbose output.
    pub fn log_level(&self, general: &GeneralConfig) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build the record filter from the filter flags.
    pub fn filter_context(&self) -> FilterContext {
        let mut filter = FilterContext::new();

        if let Some(ref states) = self.state {
            filter = filter.with_states(states);
        }
        if let Some(ref carriers) = self.carrier {
            filter = filter.with_carriers(carriers.iter().copied());
        }
        if let Some(ref levels) = self.service_level {
            filter = filter.with_service_levels(levels.iter().copied());
        }
        if self.from.is_some() || self.to.is_some() {
            filter = filter.with_order_dates(self.from, self.to);
        }

        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRecord, RouteScore};

    fn make_args() -> Args {
        Args {
            input: vec![PathBuf::from(".")],
            state: None,
            carrier: None,
            service_level: None,
            from: None,
            to: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            top_cities: None,
            parallel: false,
            on_invalid: None,
            date_format: None,
            min_on_time: None,
            validate_only: false,
            generate: None,
            seed: None,
            init_config: false,
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_parse_filter_flags() {
        let args = Args::try_parse_from([
            "shipmetrics",
            "--input",
            "orders.csv",
            "--state",
            "ca,TX",
            "--carrier",
            "amzl,FedEx",
            "--service-level",
            "prime",
            "--from",
            "2024-01-01",
            "--on-invalid",
            "fail",
        ])
        .unwrap();

        assert_eq!(args.input, vec![PathBuf::from("orders.csv")]);
        assert_eq!(
            args.state,
            Some(vec!["ca".to_string(), "TX".to_string()])
        );
        assert_eq!(args.carrier, Some(vec![Carrier::Amzl, Carrier::FedEx]));
        assert_eq!(args.service_level, Some(vec![ServiceLevel::Prime]));
        assert_eq!(args.from, Some(date(1, 1)));
        assert_eq!(args.on_invalid, Some(InvalidRecordPolicy::Fail));
        assert_eq!(args.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_input_required_unless_generating() {
        assert!(Args::try_parse_from(["shipmetrics"]).is_err());
        assert!(Args::try_parse_from(["shipmetrics", "--init-config"]).is_ok());
        assert!(Args::try_parse_from(["shipmetrics", "--generate", "10", "--seed", "3"]).is_ok());
        assert!(Args::try_parse_from(["shipmetrics", "--input", "x.csv", "--seed", "3"]).is_err());
        assert!(Args::try_parse_from(["shipmetrics", "--input", "x.csv", "--carrier", "DHL"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        assert!(args.validate().is_ok());

        args.from = Some(date(3, 1));
        args.to = Some(date(2, 1));
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.min_on_time = Some(120.0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.input = vec![PathBuf::from("definitely/not/here.csv")];
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.generate = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let general = GeneralConfig::default();
        let mut args = make_args();
        assert_eq!(args.log_level(&general), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(&general), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(&general), tracing::Level::ERROR);
    }

    #[test]
    fn test_config_file_enables_verbose_logging() {
        let general = GeneralConfig {
            verbose: true,
            ..GeneralConfig::default()
        };
        let mut args = make_args();
        assert_eq!(args.log_level(&general), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(&general), tracing::Level::ERROR);
    }

    #[test]
    fn test_filter_context() {
        let order = OrderRecord {
            order_id: "A".to_string(),
            service_level: ServiceLevel::Standard,
            carrier: Carrier::Ups,
            destination_state: "TX".to_string(),
            destination_city: "Austin".to_string(),
            order_date: date(2, 10),
            delivery_date: date(2, 15),
            promised_delivery_date: date(2, 16),
            route_score: RouteScore::Low,
            delivery_cost_cents: None,
        };

        let mut args = make_args();
        assert!(args.filter_context().is_unrestricted());

        args.state = Some(vec!["tx".to_string()]);
        args.to = Some(date(2, 10));
        assert!(args.filter_context().matches(&order));

        args.service_level = Some(vec![ServiceLevel::Prime]);
        assert!(!args.filter_context().matches(&order));
    }
}
