//! Data models for the delivery metrics engine.
//!
//! This module contains the order records fed into the engine, their
//! categorical dimensions, and the metric snapshot handed to the
//! presentation layer.

use crate::ingest::IngestSummary;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Delivery service tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceLevel {
    Prime,
    Standard,
}

impl ServiceLevel {
    pub const ALL: [ServiceLevel; 2] = [ServiceLevel::Prime, ServiceLevel::Standard];
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLevel::Prime => write!(f, "Prime"),
            ServiceLevel::Standard => write!(f, "Standard"),
        }
    }
}

impl FromStr for ServiceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prime" => Ok(ServiceLevel::Prime),
            "standard" => Ok(ServiceLevel::Standard),
            other => Err(format!("unknown service level '{}'", other)),
        }
    }
}

/// Carrier handling the last-mile delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Carrier {
    /// Amazon Logistics
    #[serde(rename = "AMZL")]
    Amzl,
    #[serde(rename = "UPS")]
    Ups,
    #[serde(rename = "USPS")]
    Usps,
    #[serde(rename = "FedEx")]
    FedEx,
}

impl Carrier {
    pub const ALL: [Carrier; 4] = [Carrier::Amzl, Carrier::Ups, Carrier::Usps, Carrier::FedEx];

    /// Whether the carrier is a third party rather than Amazon's own fleet.
    pub fn is_third_party(&self) -> bool {
        !matches!(self, Carrier::Amzl)
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Carrier::Amzl => write!(f, "AMZL"),
            Carrier::Ups => write!(f, "UPS"),
            Carrier::Usps => write!(f, "USPS"),
            Carrier::FedEx => write!(f, "FedEx"),
        }
    }
}

impl FromStr for Carrier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amzl" | "amazon logistics" => Ok(Carrier::Amzl),
            "ups" => Ok(Carrier::Ups),
            "usps" => Ok(Carrier::Usps),
            "fedex" => Ok(Carrier::FedEx),
            other => Err(format!("unknown carrier '{}'", other)),
        }
    }
}

/// Categorical route efficiency rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteScore {
    High,
    Medium,
    Low,
}

impl RouteScore {
    pub const ALL: [RouteScore; 3] = [RouteScore::High, RouteScore::Medium, RouteScore::Low];
}

impl fmt::Display for RouteScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteScore::High => write!(f, "High"),
            RouteScore::Medium => write!(f, "Medium"),
            RouteScore::Low => write!(f, "Low"),
        }
    }
}

impl FromStr for RouteScore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(RouteScore::High),
            "medium" => Ok(RouteScore::Medium),
            "low" => Ok(RouteScore::Low),
            other => Err(format!("unknown route score '{}'", other)),
        }
    }
}

/// Delivery outcome relative to the promised date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Early,
    OnTime,
    Late,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Early => write!(f, "Early"),
            DeliveryStatus::OnTime => write!(f, "On-Time"),
            DeliveryStatus::Late => write!(f, "Late"),
        }
    }
}

/// Normalize a destination state code for storage and filtering.
pub fn normalize_state(state: &str) -> String {
    state.trim().to_ascii_uppercase()
}

/// One shipment. Constructed only through ingestion validation, so
/// `delivery_date >= order_date` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub service_level: ServiceLevel,
    pub carrier: Carrier,
    /// Upper-cased state code.
    pub destination_state: String,
    pub destination_city: String,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub promised_delivery_date: NaiveDate,
    pub route_score: RouteScore,
    /// Conceptual delivery cost, in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_cost_cents: Option<i64>,
}

impl OrderRecord {
    /// Whole days between ordering and delivery.
    pub fn delivery_days(&self) -> i64 {
        (self.delivery_date - self.order_date).num_days()
    }

    /// Delivered on or before the promised date.
    pub fn on_time(&self) -> bool {
        self.delivery_date <= self.promised_delivery_date
    }

    pub fn delivery_status(&self) -> DeliveryStatus {
        match self.delivery_date.cmp(&self.promised_delivery_date) {
            std::cmp::Ordering::Less => DeliveryStatus::Early,
            std::cmp::Ordering::Equal => DeliveryStatus::OnTime,
            std::cmp::Ordering::Greater => DeliveryStatus::Late,
        }
    }

    pub fn order_weekday(&self) -> Weekday {
        self.order_date.weekday()
    }
}

/// A value kept separately for each service level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerServiceLevel<T> {
    pub prime: T,
    pub standard: T,
}

impl<T> PerServiceLevel<T> {
    pub fn get(&self, level: ServiceLevel) -> &T {
        match level {
            ServiceLevel::Prime => &self.prime,
            ServiceLevel::Standard => &self.standard,
        }
    }

    pub fn get_mut(&mut self, level: ServiceLevel) -> &mut T {
        match level {
            ServiceLevel::Prime => &mut self.prime,
            ServiceLevel::Standard => &mut self.standard,
        }
    }
}

impl PerServiceLevel<usize> {
    pub fn total(&self) -> usize {
        self.prime + self.standard
    }
}

/// Count of deliveries by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub early: usize,
    pub on_time: usize,
    pub late: usize,
}

/// Headline figures for one service level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevelMetrics {
    /// Orders in the group.
    pub orders: usize,
    /// Mean delivery days; `0.0` for an empty group.
    pub avg_delivery_days: f64,
    /// Percentage delivered on or before the promised date; `0.0` for an empty group.
    pub on_time_pct: f64,
    pub status: StatusCounts,
    /// Mean conceptual cost in currency units, over orders that carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_delivery_cost: Option<f64>,
}

/// An absolute count together with its share of the filtered total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareCount {
    pub count: usize,
    pub pct: f64,
}

/// Orders placed on one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayCounts {
    pub weekday: Weekday,
    pub total: usize,
    pub on_time: usize,
}

/// Non-fatal condition surfaced alongside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmptyResultWarning {
    /// No record matched the filter.
    EmptyFilteredSet,
    /// One service level has no records; its averages default to zero.
    EmptyServiceLevel { service_level: ServiceLevel },
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyResultWarning::EmptyFilteredSet => {
                write!(f, "No orders match the active filter; all metrics are zero")
            }
            EmptyResultWarning::EmptyServiceLevel { service_level } => write!(
                f,
                "No {} orders match the active filter; its averages are reported as 0",
                service_level
            ),
        }
    }
}

/// Every dashboard metric, computed from one filtered snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Size of the filtered set.
    pub total_orders: usize,
    pub service_levels: PerServiceLevel<ServiceLevelMetrics>,
    /// Utilization of every carrier, including those with no orders.
    pub carriers: BTreeMap<Carrier, ShareCount>,
    /// Orders per destination city and service level (unranked).
    pub cities: BTreeMap<String, PerServiceLevel<usize>>,
    /// Histogram of delivery days per service level.
    pub delivery_days: PerServiceLevel<BTreeMap<i64, usize>>,
    pub route_scores: BTreeMap<RouteScore, ShareCount>,
    /// Orders per destination state.
    pub states: BTreeMap<String, usize>,
    /// Monday through Sunday, by order date.
    pub weekdays: Vec<WeekdayCounts>,
    #[serde(default)]
    pub warnings: Vec<EmptyResultWarning>,
}

impl MetricSnapshot {
    /// The `n` busiest cities by total volume, ties broken by name.
    pub fn major_cities(&self, n: usize) -> Vec<(&str, &PerServiceLevel<usize>)> {
        let mut cities: Vec<_> = self
            .cities
            .iter()
            .map(|(city, counts)| (city.as_str(), counts))
            .collect();

        cities.sort_by(|a, b| b.1.total().cmp(&a.1.total()).then_with(|| a.0.cmp(b.0)));
        cities.truncate(n);

        cities
    }

    /// On-time percentage across both service levels.
    pub fn overall_on_time_pct(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }

        let on_time: usize = ServiceLevel::ALL
            .iter()
            .map(|level| {
                let status = &self.service_levels.get(*level).status;
                status.early + status.on_time
            })
            .sum();

        on_time as f64 / self.total_orders as f64 * 100.0
    }

    pub fn carrier_share(&self, carrier: Carrier) -> f64 {
        self.carriers.get(&carrier).map(|s| s.pct).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.total_orders == 0
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Input paths as given on the command line.
    pub inputs: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Human-readable description of the active filter.
    pub filter: String,
    /// Records in the store when the snapshot was taken.
    pub records_loaded: usize,
    pub ingest: IngestSummary,
    pub duration_seconds: f64,
}

/// The complete delivery performance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub metrics: MetricSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(delivered: NaiveDate, promised: NaiveDate) -> OrderRecord {
        OrderRecord {
            order_id: "ORD-0000001".to_string(),
            service_level: ServiceLevel::Prime,
            carrier: Carrier::Amzl,
            destination_state: "WA".to_string(),
            destination_city: "Seattle".to_string(),
            order_date: date(2024, 1, 1),
            delivery_date: delivered,
            promised_delivery_date: promised,
            route_score: RouteScore::High,
            delivery_cost_cents: None,
        }
    }

    #[test]
    fn test_derived_fields() {
        let early = record(date(2024, 1, 2), date(2024, 1, 3));
        assert_eq!(early.delivery_days(), 1);
        assert!(early.on_time());
        assert_eq!(early.delivery_status(), DeliveryStatus::Early);

        let exact = record(date(2024, 1, 3), date(2024, 1, 3));
        assert!(exact.on_time());
        assert_eq!(exact.delivery_status(), DeliveryStatus::OnTime);

        let late = record(date(2024, 1, 5), date(2024, 1, 3));
        assert_eq!(late.delivery_days(), 4);
        assert!(!late.on_time());
        assert_eq!(late.delivery_status(), DeliveryStatus::Late);

        // 2024-01-01 was a Monday
        assert_eq!(late.order_weekday(), Weekday::Mon);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("prime".parse::<ServiceLevel>(), Ok(ServiceLevel::Prime));
        assert_eq!(" Standard ".parse::<ServiceLevel>(), Ok(ServiceLevel::Standard));
        assert!("express".parse::<ServiceLevel>().is_err());

        assert_eq!("AMZL".parse::<Carrier>(), Ok(Carrier::Amzl));
        assert_eq!("fedex".parse::<Carrier>(), Ok(Carrier::FedEx));
        assert!("DHL".parse::<Carrier>().is_err());

        assert_eq!("MEDIUM".parse::<RouteScore>(), Ok(RouteScore::Medium));
    }

    #[test]
    fn test_carrier_display_matches_serde() {
        for carrier in Carrier::ALL {
            let json = serde_json::to_string(&carrier).unwrap();
            assert_eq!(json, format!("\"{}\"", carrier));
        }
        assert!(Carrier::Ups.is_third_party());
        assert!(!Carrier::Amzl.is_third_party());
    }

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state(" ca "), "CA");
        assert_eq!(normalize_state("NY"), "NY");
    }

    #[test]
    fn test_warning_serialization() {
        let warning = EmptyResultWarning::EmptyServiceLevel {
            service_level: ServiceLevel::Standard,
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("\"kind\":\"empty_service_level\""));
        assert!(warning.to_string().contains("Standard"));
    }
}
