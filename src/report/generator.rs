//! Markdown report generation.
//!
//! This module generates delivery performance reports from a metric
//! snapshot. Percentages and averages are rounded half to even at
//! `ReportConfig::decimals` places; the snapshot itself is untouched.

use crate::config::ReportConfig;
use crate::models::{
    MetricSnapshot, PerServiceLevel, Report, ReportMetadata, ServiceLevel, ServiceLevelMetrics,
};
use anyhow::Result;
use std::collections::BTreeMap;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let metrics = &report.metrics;
    let fmt = Number::new(options.decimals);
    let mut output = String::new();

    // Title
    output.push_str("# Delivery Performance Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(metrics, options));
    output.push_str(&generate_overview_section(metrics, &fmt));
    output.push_str(&generate_service_level_section(metrics, &fmt));
    output.push_str(&generate_carrier_section(metrics, &fmt));
    output.push_str(&generate_route_score_section(metrics, &fmt));
    output.push_str(&generate_city_section(metrics, options.top_cities));

    if options.include_states {
        output.push_str(&generate_state_section(metrics));
    }

    output.push_str(&generate_weekday_section(metrics, &fmt));

    if options.include_histograms {
        output.push_str(&generate_histogram_section(&metrics.delivery_days));
    }

    output.push_str(&generate_warnings_section(metrics));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report. Values keep full precision.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Round half to even at `decimals` places.
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

/// Fixed-precision number formatting for report cells.
struct Number {
    decimals: u32,
}

impl Number {
    fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    fn value(&self, value: f64) -> String {
        format!(
            "{:.*}",
            self.decimals as usize,
            round_half_even(value, self.decimals)
        )
    }

    fn pct(&self, value: f64) -> String {
        format!("{}%", self.value(value))
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Inputs:** {}\n", metadata.inputs.join(", ")));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Filter:** {}\n", metadata.filter));
    section.push_str(&format!(
        "- **Records Loaded:** {}\n",
        metadata.records_loaded
    ));

    let ingest = &metadata.ingest;
    section.push_str(&format!(
        "- **Ingestion:** {} files, {} rows, {} accepted\n",
        ingest.files, ingest.rows, ingest.accepted
    ));
    if ingest.rejected > 0 {
        section.push_str(&format!("- **Rejected Rows:** {}\n", ingest.rejected));
    }
    if ingest.duplicates > 0 {
        section.push_str(&format!("- **Duplicate Orders:** {}\n", ingest.duplicates));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(metrics: &MetricSnapshot, options: &ReportConfig) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");
    toc.push_str("- [Service Level Comparison](#service-level-comparison)\n");
    toc.push_str("- [Carrier Utilization](#carrier-utilization)\n");
    toc.push_str("- [Route Scores](#route-scores)\n");
    toc.push_str("- [Major Cities](#major-cities)\n");
    if options.include_states {
        toc.push_str("- [Destination States](#destination-states)\n");
    }
    toc.push_str("- [Orders by Weekday](#orders-by-weekday)\n");
    if options.include_histograms {
        toc.push_str("- [Delivery Time Distribution](#delivery-time-distribution)\n");
    }
    if !metrics.warnings.is_empty() {
        toc.push_str("- [Warnings](#warnings)\n");
    }
    toc.push('\n');

    toc
}

/// Generate the headline overview.
fn generate_overview_section(metrics: &MetricSnapshot, fmt: &Number) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Orders | Prime | Standard | On-Time |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {} | {} | {} |\n\n",
        metrics.total_orders,
        metrics.service_levels.prime.orders,
        metrics.service_levels.standard.orders,
        fmt.pct(metrics.overall_on_time_pct())
    ));

    section
}

/// Generate the Prime vs Standard comparison.
fn generate_service_level_section(metrics: &MetricSnapshot, fmt: &Number) -> String {
    let levels = &metrics.service_levels;
    let mut section = String::new();

    section.push_str("## Service Level Comparison\n\n");
    section.push_str("| Metric | Prime | Standard |\n");
    section.push_str("|:---|---:|---:|\n");

    let rows: [(&str, fn(&ServiceLevelMetrics, &Number) -> String); 6] = [
        ("Orders", |m, _| m.orders.to_string()),
        ("Avg Delivery Days", |m, fmt| fmt.value(m.avg_delivery_days)),
        ("On-Time Rate", |m, fmt| fmt.pct(m.on_time_pct)),
        ("Early", |m, _| m.status.early.to_string()),
        ("On Promise Date", |m, _| m.status.on_time.to_string()),
        ("Late", |m, _| m.status.late.to_string()),
    ];

    for (label, cell) in rows {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            label,
            cell(&levels.prime, fmt),
            cell(&levels.standard, fmt)
        ));
    }

    if levels.prime.avg_delivery_cost.is_some() || levels.standard.avg_delivery_cost.is_some() {
        section.push_str(&format!(
            "| Avg Delivery Cost | {} | {} |\n",
            format_cost(levels.prime.avg_delivery_cost),
            format_cost(levels.standard.avg_delivery_cost)
        ));
    }
    section.push('\n');

    section
}

fn format_cost(cost: Option<f64>) -> String {
    match cost {
        Some(cost) => format!("${:.2}", round_half_even(cost, 2)),
        None => "-".to_string(),
    }
}

/// Generate the carrier utilization table.
fn generate_carrier_section(metrics: &MetricSnapshot, fmt: &Number) -> String {
    let mut section = String::new();

    section.push_str("## Carrier Utilization\n\n");
    section.push_str("| Carrier | Orders | Share |\n");
    section.push_str("|:---|---:|---:|\n");

    let mut carriers: Vec<_> = metrics.carriers.iter().collect();
    carriers.sort_by_key(|(_, share)| std::cmp::Reverse(share.count));

    for (carrier, share) in carriers {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            carrier,
            share.count,
            fmt.pct(share.pct)
        ));
    }
    section.push('\n');

    section
}

/// Generate the route score table.
fn generate_route_score_section(metrics: &MetricSnapshot, fmt: &Number) -> String {
    let mut section = String::new();

    section.push_str("## Route Scores\n\n");
    section.push_str("| Score | Orders | Share |\n");
    section.push_str("|:---|---:|---:|\n");

    for (score, share) in &metrics.route_scores {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            score,
            share.count,
            fmt.pct(share.pct)
        ));
    }
    section.push('\n');

    section
}

/// Generate the major cities table.
fn generate_city_section(metrics: &MetricSnapshot, top: usize) -> String {
    let mut section = String::new();

    section.push_str("## Major Cities\n\n");

    let cities = metrics.major_cities(top);
    if cities.is_empty() {
        section.push_str("No orders in the selected range.\n\n");
        return section;
    }

    section.push_str("| City | Prime | Standard | Total |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for (city, counts) in cities {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            city,
            counts.prime,
            counts.standard,
            counts.total()
        ));
    }
    if metrics.cities.len() > top {
        section.push_str(&format!(
            "\n*Showing {} of {} cities.*\n",
            top,
            metrics.cities.len()
        ));
    }
    section.push('\n');

    section
}

/// Generate the state distribution table.
fn generate_state_section(metrics: &MetricSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Destination States\n\n");

    if metrics.states.is_empty() {
        section.push_str("No orders in the selected range.\n\n");
        return section;
    }

    section.push_str("| State | Orders |\n");
    section.push_str("|:---|---:|\n");

    let mut states: Vec<_> = metrics.states.iter().collect();
    states.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

    for (state, count) in states {
        section.push_str(&format!("| {} | {} |\n", state, count));
    }
    section.push('\n');

    section
}

/// Generate the order weekday table.
fn generate_weekday_section(metrics: &MetricSnapshot, fmt: &Number) -> String {
    let mut section = String::new();

    section.push_str("## Orders by Weekday\n\n");
    section.push_str("| Weekday | Orders | On-Time |\n");
    section.push_str("|:---|---:|---:|\n");

    for day in &metrics.weekdays {
        let on_time = if day.total == 0 {
            0.0
        } else {
            day.on_time as f64 / day.total as f64 * 100.0
        };
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            day.weekday,
            day.total,
            fmt.pct(on_time)
        ));
    }
    section.push('\n');

    section
}

/// Generate the delivery-day histogram table.
fn generate_histogram_section(histograms: &PerServiceLevel<BTreeMap<i64, usize>>) -> String {
    let mut section = String::new();

    section.push_str("## Delivery Time Distribution\n\n");

    let mut days: Vec<i64> = ServiceLevel::ALL
        .iter()
        .flat_map(|level| histograms.get(*level).keys().copied())
        .collect();
    days.sort_unstable();
    days.dedup();

    if days.is_empty() {
        section.push_str("No orders in the selected range.\n\n");
        return section;
    }

    section.push_str("| Days | Prime | Standard |\n");
    section.push_str("|---:|---:|---:|\n");
    for day in days {
        let count = |level: ServiceLevel| histograms.get(level).get(&day).copied().unwrap_or(0);
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            day,
            count(ServiceLevel::Prime),
            count(ServiceLevel::Standard)
        ));
    }
    section.push('\n');

    section
}

/// Generate the warnings section.
fn generate_warnings_section(metrics: &MetricSnapshot) -> String {
    if metrics.warnings.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Warnings\n\n");
    for warning in &metrics.warnings {
        section.push_str(&format!("> ⚠️ {}\n\n", warning));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by shipmetrics v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}
