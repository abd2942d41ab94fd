//! Order aggregation and delivery statistics.
//!
//! A single pass folds the filtered records into a [`Tally`] of integer
//! counters, which is then turned into a [`MetricSnapshot`]. Because every
//! counter is an integer, tallies merge exactly, and the sequential and
//! parallel reductions produce identical snapshots.

use super::filter::FilterContext;
use crate::models::{
    Carrier, DeliveryStatus, EmptyResultWarning, MetricSnapshot, OrderRecord, PerServiceLevel,
    RouteScore, ServiceLevel, ServiceLevelMetrics, ShareCount, StatusCounts, WeekdayCounts,
};
use chrono::Weekday;
use rayon::prelude::*;
use std::collections::BTreeMap;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Compute every metric over the records matching `filter`.
pub fn compute(records: &[OrderRecord], filter: &FilterContext) -> MetricSnapshot {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .fold(Tally::default(), |mut tally, record| {
            tally.add(record);
            tally
        })
        .finish()
}

/// Same as [`compute`], reduced across the rayon thread pool.
pub fn compute_parallel(records: &[OrderRecord], filter: &FilterContext) -> MetricSnapshot {
    records
        .par_iter()
        .filter(|record| filter.matches(record))
        .fold(Tally::default, |mut tally, record| {
            tally.add(record);
            tally
        })
        .reduce(Tally::default, Tally::merge)
        .finish()
}

/// Running counters for one service level.
#[derive(Debug, Clone, Default)]
struct GroupTally {
    orders: usize,
    delivery_days: i64,
    status: StatusCounts,
    /// Wide enough that summing any number of accepted costs cannot overflow.
    cost_cents: i128,
    costed_orders: usize,
    histogram: BTreeMap<i64, usize>,
}

impl GroupTally {
    fn add(&mut self, record: &OrderRecord) {
        let days = record.delivery_days();

        self.orders += 1;
        self.delivery_days += days;
        *self.histogram.entry(days).or_default() += 1;

        match record.delivery_status() {
            DeliveryStatus::Early => self.status.early += 1,
            DeliveryStatus::OnTime => self.status.on_time += 1,
            DeliveryStatus::Late => self.status.late += 1,
        }

        if let Some(cents) = record.delivery_cost_cents {
            self.cost_cents += i128::from(cents);
            self.costed_orders += 1;
        }
    }

    fn merge(mut self, other: GroupTally) -> Self {
        self.orders += other.orders;
        self.delivery_days += other.delivery_days;
        self.status.early += other.status.early;
        self.status.on_time += other.status.on_time;
        self.status.late += other.status.late;
        self.cost_cents += other.cost_cents;
        self.costed_orders += other.costed_orders;
        merge_counts(&mut self.histogram, other.histogram);
        self
    }

    fn metrics(&self) -> ServiceLevelMetrics {
        if self.orders == 0 {
            return ServiceLevelMetrics::default();
        }

        let orders = self.orders as f64;
        let on_time = self.status.early + self.status.on_time;
        let avg_delivery_cost = (self.costed_orders > 0)
            .then(|| self.cost_cents as f64 / self.costed_orders as f64 / 100.0);

        ServiceLevelMetrics {
            orders: self.orders,
            avg_delivery_days: self.delivery_days as f64 / orders,
            on_time_pct: on_time as f64 / orders * 100.0,
            status: self.status,
            avg_delivery_cost,
        }
    }
}

/// Counters for the whole filtered set.
#[derive(Debug, Clone, Default)]
struct Tally {
    total: usize,
    groups: PerServiceLevel<GroupTally>,
    carriers: BTreeMap<Carrier, usize>,
    cities: BTreeMap<String, PerServiceLevel<usize>>,
    route_scores: BTreeMap<RouteScore, usize>,
    states: BTreeMap<String, usize>,
    /// `(total, on_time)` indexed from Monday.
    weekdays: [(usize, usize); 7],
}

impl Tally {
    fn add(&mut self, record: &OrderRecord) {
        self.total += 1;
        self.groups.get_mut(record.service_level).add(record);

        *self.carriers.entry(record.carrier).or_default() += 1;
        *self.route_scores.entry(record.route_score).or_default() += 1;
        *self
            .states
            .entry(record.destination_state.clone())
            .or_default() += 1;
        *self
            .cities
            .entry(record.destination_city.clone())
            .or_default()
            .get_mut(record.service_level) += 1;

        let day = &mut self.weekdays[record.order_weekday().num_days_from_monday() as usize];
        day.0 += 1;
        if record.on_time() {
            day.1 += 1;
        }
    }

    fn merge(mut self, other: Tally) -> Self {
        self.total += other.total;
        self.groups = PerServiceLevel {
            prime: self.groups.prime.merge(other.groups.prime),
            standard: self.groups.standard.merge(other.groups.standard),
        };

        merge_counts(&mut self.carriers, other.carriers);
        merge_counts(&mut self.route_scores, other.route_scores);
        merge_counts(&mut self.states, other.states);

        for (city, counts) in other.cities {
            let entry = self.cities.entry(city).or_default();
            entry.prime += counts.prime;
            entry.standard += counts.standard;
        }

        for (mine, theirs) in self.weekdays.iter_mut().zip(other.weekdays) {
            mine.0 += theirs.0;
            mine.1 += theirs.1;
        }

        self
    }

    fn finish(self) -> MetricSnapshot {
        let mut warnings = Vec::new();
        if self.total == 0 {
            warnings.push(EmptyResultWarning::EmptyFilteredSet);
        }
        for level in ServiceLevel::ALL {
            if self.groups.get(level).orders == 0 {
                warnings.push(EmptyResultWarning::EmptyServiceLevel {
                    service_level: level,
                });
            }
        }

        let carriers = Carrier::ALL
            .iter()
            .map(|carrier| {
                let count = self.carriers.get(carrier).copied().unwrap_or(0);
                (*carrier, share(count, self.total))
            })
            .collect();

        let route_scores = RouteScore::ALL
            .iter()
            .map(|score| {
                let count = self.route_scores.get(score).copied().unwrap_or(0);
                (*score, share(count, self.total))
            })
            .collect();

        let weekdays = WEEKDAYS
            .iter()
            .zip(self.weekdays)
            .map(|(weekday, (total, on_time))| WeekdayCounts {
                weekday: *weekday,
                total,
                on_time,
            })
            .collect();

        MetricSnapshot {
            total_orders: self.total,
            service_levels: PerServiceLevel {
                prime: self.groups.prime.metrics(),
                standard: self.groups.standard.metrics(),
            },
            carriers,
            cities: self.cities,
            delivery_days: PerServiceLevel {
                prime: self.groups.prime.histogram,
                standard: self.groups.standard.histogram,
            },
            route_scores,
            states: self.states,
            weekdays,
            warnings,
        }
    }
}

fn share(count: usize, total: usize) -> ShareCount {
    let pct = if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    };

    ShareCount { count, pct }
}

fn merge_counts<K: Ord>(into: &mut BTreeMap<K, usize>, from: BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}
