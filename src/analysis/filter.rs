//! Filter context applied before aggregation.
//!
//! Each dimension is optional. An unset dimension and an empty set both
//! mean "no restriction", so a slicer with nothing selected behaves the
//! same as no slicer at all.

use crate::models::{normalize_state, Carrier, OrderRecord, ServiceLevel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Inclusive range of order dates. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Selection applied to the record set for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    states: Option<BTreeSet<String>>,
    carriers: Option<BTreeSet<Carrier>>,
    service_levels: Option<BTreeSet<ServiceLevel>>,
    order_dates: Option<DateRange>,
}

impl FilterContext {
    /// A filter that selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to destination states. Codes are normalized like records.
    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.states = Some(
            states
                .into_iter()
                .map(|s| normalize_state(s.as_ref()))
                .collect(),
        );
        self
    }

    pub fn with_carriers<I: IntoIterator<Item = Carrier>>(mut self, carriers: I) -> Self {
        self.carriers = Some(carriers.into_iter().collect());
        self
    }

    pub fn with_service_levels<I: IntoIterator<Item = ServiceLevel>>(mut self, levels: I) -> Self {
        self.service_levels = Some(levels.into_iter().collect());
        self
    }

    pub fn with_order_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.order_dates = Some(DateRange { from, to });
        self
    }

    /// Whether `record` falls inside every active dimension.
    pub fn matches(&self, record: &OrderRecord) -> bool {
        in_set(&self.states, &record.destination_state)
            && in_set(&self.carriers, &record.carrier)
            && in_set(&self.service_levels, &record.service_level)
            && self
                .order_dates
                .map_or(true, |range| range.contains(record.order_date))
    }

    /// True when no dimension restricts the record set.
    pub fn is_unrestricted(&self) -> bool {
        is_open(&self.states)
            && is_open(&self.carriers)
            && is_open(&self.service_levels)
            && self.order_dates.map_or(true, |range| range.is_open())
    }

    /// Human-readable summary, e.g. `state in {CA, TX}; carrier in {UPS}`.
    pub fn describe(&self) -> String {
        if self.is_unrestricted() {
            return "none (all orders)".to_string();
        }

        let mut parts = Vec::new();

        if let Some(part) = describe_set("state", &self.states) {
            parts.push(part);
        }
        if let Some(part) = describe_set("carrier", &self.carriers) {
            parts.push(part);
        }
        if let Some(part) = describe_set("service level", &self.service_levels) {
            parts.push(part);
        }
        if let Some(range) = self.order_dates.filter(|r| !r.is_open()) {
            let from = range.from.map(|d| d.to_string()).unwrap_or_else(|| "..".to_string());
            let to = range.to.map(|d| d.to_string()).unwrap_or_else(|| "..".to_string());
            parts.push(format!("order date {} to {}", from, to));
        }

        parts.join("; ")
    }
}

fn in_set<T: Ord>(set: &Option<BTreeSet<T>>, value: &T) -> bool {
    match set {
        Some(values) if !values.is_empty() => values.contains(value),
        _ => true,
    }
}

fn is_open<T>(set: &Option<BTreeSet<T>>) -> bool {
    set.as_ref().map_or(true, |values| values.is_empty())
}

fn describe_set<T: Display>(name: &str, set: &Option<BTreeSet<T>>) -> Option<String> {
    let values = set.as_ref().filter(|values| !values.is_empty())?;
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    Some(format!("{} in {{{}}}", name, joined.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteScore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(state: &str, carrier: Carrier, level: ServiceLevel) -> OrderRecord {
        OrderRecord {
            order_id: "ORD-1".to_string(),
            service_level: level,
            carrier,
            destination_state: state.to_string(),
            destination_city: "Austin".to_string(),
            order_date: date(2024, 5, 15),
            delivery_date: date(2024, 5, 17),
            promised_delivery_date: date(2024, 5, 17),
            route_score: RouteScore::Medium,
            delivery_cost_cents: None,
        }
    }

    #[test]
    fn test_unset_filter_matches_everything() {
        let filter = FilterContext::new();
        assert!(filter.is_unrestricted());
        assert!(filter.matches(&record("TX", Carrier::Ups, ServiceLevel::Standard)));
    }

    #[test]
    fn test_empty_sets_are_unrestricted() {
        let filter = FilterContext::new()
            .with_states(Vec::<String>::new())
            .with_carriers(Vec::new());

        assert!(filter.is_unrestricted());
        assert!(filter.matches(&record("TX", Carrier::Ups, ServiceLevel::Prime)));
    }

    #[test]
    fn test_state_and_carrier_filters() {
        let filter = FilterContext::new()
            .with_states(["tx", "CA"])
            .with_carriers([Carrier::Ups]);

        assert!(filter.matches(&record("TX", Carrier::Ups, ServiceLevel::Prime)));
        assert!(!filter.matches(&record("TX", Carrier::FedEx, ServiceLevel::Prime)));
        assert!(!filter.matches(&record("NY", Carrier::Ups, ServiceLevel::Prime)));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let order = record("TX", Carrier::Ups, ServiceLevel::Prime);

        let exact = FilterContext::new().with_order_dates(Some(date(2024, 5, 15)), Some(date(2024, 5, 15)));
        assert!(exact.matches(&order));

        let after = FilterContext::new().with_order_dates(Some(date(2024, 5, 16)), None);
        assert!(!after.matches(&order));

        let before = FilterContext::new().with_order_dates(None, Some(date(2024, 5, 14)));
        assert!(!before.matches(&order));
    }

    #[test]
    fn test_service_level_filter() {
        let filter = FilterContext::new().with_service_levels([ServiceLevel::Standard]);
        assert!(!filter.matches(&record("TX", Carrier::Ups, ServiceLevel::Prime)));
        assert!(filter.matches(&record("TX", Carrier::Ups, ServiceLevel::Standard)));
    }

    #[test]
    fn test_describe() {
        assert_eq!(FilterContext::new().describe(), "none (all orders)");

        let filter = FilterContext::new()
            .with_states(["tx", "ca"])
            .with_carriers([Carrier::Ups])
            .with_order_dates(Some(date(2024, 1, 1)), None);

        assert_eq!(
            filter.describe(),
            "state in {CA, TX}; carrier in {UPS}; order date 2024-01-01 to .."
        );
    }
}
