//! Query engine over the shared record store.

use super::aggregator::{compute, compute_parallel};
use super::filter::FilterContext;
use crate::config::EngineConfig;
use crate::models::MetricSnapshot;
use crate::store::OrderStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Answers metric queries against the current contents of an [`OrderStore`].
///
/// Each query works on one snapshot taken when it starts, so concurrent
/// appends never make the metrics of a single snapshot disagree.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<OrderStore>,
    parallel_threshold: usize,
}

impl Engine {
    pub fn new(store: Arc<OrderStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            parallel_threshold: config.parallel_threshold,
        }
    }

    /// Compute a fresh snapshot for `filter`.
    pub fn query(&self, filter: &FilterContext) -> MetricSnapshot {
        let started = Instant::now();
        let records = self.store.snapshot();
        let parallel = records.len() >= self.parallel_threshold;

        let metrics = if parallel {
            compute_parallel(&records, filter)
        } else {
            compute(&records, filter)
        };

        debug!(
            "Aggregated {} of {} records ({}) in {:?}",
            metrics.total_orders,
            records.len(),
            if parallel { "parallel" } else { "sequential" },
            started.elapsed()
        );

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Carrier, OrderRecord, RouteScore, ServiceLevel};
    use chrono::NaiveDate;

    fn order(id: &str, carrier: Carrier) -> OrderRecord {
        let day = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        OrderRecord {
            order_id: id.to_string(),
            service_level: ServiceLevel::Standard,
            carrier,
            destination_state: "NY".to_string(),
            destination_city: "Buffalo".to_string(),
            order_date: day,
            delivery_date: day,
            promised_delivery_date: day,
            route_score: RouteScore::Low,
            delivery_cost_cents: Some(420),
        }
    }

    #[test]
    fn test_query_reads_current_store() {
        let store = Arc::new(OrderStore::new());
        let engine = Engine::new(store.clone(), &EngineConfig::default());

        assert_eq!(engine.query(&FilterContext::new()).total_orders, 0);

        store.append(vec![order("A", Carrier::Ups), order("B", Carrier::FedEx)]);
        let metrics = engine.query(&FilterContext::new());

        assert_eq!(metrics.total_orders, 2);
        assert_eq!(metrics.carrier_share(Carrier::Ups), 50.0);
    }

    #[test]
    fn test_parallel_and_sequential_paths_agree() {
        let store = Arc::new(OrderStore::new());
        store.append(
            (0..64)
                .map(|i| {
                    let carrier = Carrier::ALL[i % Carrier::ALL.len()];
                    order(&format!("ORD-{}", i), carrier)
                })
                .collect(),
        );

        let sequential = Engine::new(
            store.clone(),
            &EngineConfig {
                parallel_threshold: usize::MAX,
            },
        );
        let parallel = Engine::new(
            store,
            &EngineConfig {
                parallel_threshold: 0,
            },
        );

        let filter = FilterContext::new().with_carriers([Carrier::Ups, Carrier::Amzl]);
        assert_eq!(sequential.query(&filter), parallel.query(&filter));
    }

    #[test]
    fn test_concurrent_queries_with_different_filters() {
        let store = Arc::new(OrderStore::new());
        store.append(vec![order("A", Carrier::Ups), order("B", Carrier::Usps)]);
        let engine = Engine::new(store, &EngineConfig::default());

        let handles: Vec<_> = Carrier::ALL
            .into_iter()
            .map(|carrier| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine
                        .query(&FilterContext::new().with_carriers([carrier]))
                        .total_orders
                })
            })
            .collect();

        let totals: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(totals, vec![0, 1, 1, 0]);
    }
}
