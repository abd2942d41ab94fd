//! In-memory record store.
//!
//! Holds validated orders behind a copy-on-write `Arc<Vec<_>>`. Readers
//! clone the `Arc` under a read lock and keep an immutable snapshot for as
//! long as they need it; writers extend the vector under the write lock,
//! copying it first only if a snapshot is still alive.

use crate::error::ValidationError;
use crate::models::OrderRecord;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Immutable view of the store at one point in time.
pub type Snapshot = Arc<Vec<OrderRecord>>;

#[derive(Debug, Default)]
struct StoreInner {
    records: Snapshot,
    ids: HashSet<String>,
}

/// Result of appending one batch.
#[derive(Debug, Default)]
pub struct AppendOutcome {
    /// Records added to the store.
    pub accepted: usize,
    /// Records dropped because their `order_id` was already present.
    pub duplicates: Vec<ValidationError>,
}

/// A batch refused by [`OrderStore::try_append`]; nothing from it was stored.
#[derive(Debug)]
pub struct RejectedBatch {
    /// Position in the batch of the first record whose id was already taken.
    pub index: usize,
    pub error: ValidationError,
}

/// Append-only store of validated order records.
#[derive(Debug, Default)]
pub struct OrderStore {
    inner: RwLock<StoreInner>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch atomically, dropping orders whose id is already known.
    pub fn append(&self, batch: Vec<OrderRecord>) -> AppendOutcome {
        let mut outcome = AppendOutcome::default();
        let mut inner = self.inner.write();
        let StoreInner { records, ids } = &mut *inner;

        let fresh: Vec<OrderRecord> = batch
            .into_iter()
            .filter(|record| {
                if ids.insert(record.order_id.clone()) {
                    true
                } else {
                    outcome.duplicates.push(ValidationError::DuplicateOrderId {
                        order_id: record.order_id.clone(),
                    });
                    false
                }
            })
            .collect();

        outcome.accepted = fresh.len();
        if !fresh.is_empty() {
            Arc::make_mut(records).extend(fresh);
        }

        outcome
    }

    /// Append a batch only if none of its ids is already known or repeated
    /// within the batch. Either every record is stored or none is.
    pub fn try_append(&self, batch: Vec<OrderRecord>) -> Result<usize, RejectedBatch> {
        let mut inner = self.inner.write();
        let StoreInner { records, ids } = &mut *inner;

        if let Some(rejected) = first_taken_id(ids, &batch) {
            return Err(rejected);
        }

        ids.extend(batch.iter().map(|record| record.order_id.clone()));
        let accepted = batch.len();
        if accepted > 0 {
            Arc::make_mut(records).extend(batch);
        }

        Ok(accepted)
    }

    /// Take a consistent snapshot of every record appended so far.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn contains(&self, order_id: &str) -> bool {
        self.inner.read().ids.contains(order_id)
    }
}

fn first_taken_id(ids: &HashSet<String>, batch: &[OrderRecord]) -> Option<RejectedBatch> {
    let mut fresh: HashSet<&str> = HashSet::with_capacity(batch.len());

    batch.iter().enumerate().find_map(|(index, record)| {
        let id = record.order_id.as_str();
        (ids.contains(id) || !fresh.insert(id)).then(|| RejectedBatch {
            index,
            error: ValidationError::DuplicateOrderId {
                order_id: record.order_id.clone(),
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Carrier, RouteScore, ServiceLevel};
    use chrono::NaiveDate;

    fn order(id: &str) -> OrderRecord {
        let day = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        OrderRecord {
            order_id: id.to_string(),
            service_level: ServiceLevel::Prime,
            carrier: Carrier::Amzl,
            destination_state: "IL".to_string(),
            destination_city: "Chicago".to_string(),
            order_date: day,
            delivery_date: day,
            promised_delivery_date: day,
            route_score: RouteScore::High,
            delivery_cost_cents: None,
        }
    }

    #[test]
    fn test_append_and_snapshot() {
        let store = OrderStore::new();
        assert!(store.is_empty());

        let outcome = store.append(vec![order("A"), order("B")]);
        assert_eq!(outcome.accepted, 2);
        assert!(outcome.duplicates.is_empty());
        assert_eq!(store.len(), 2);
        assert!(store.contains("A"));
        assert!(!store.contains("C"));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let store = OrderStore::new();
        store.append(vec![order("A")]);

        let outcome = store.append(vec![order("A"), order("B"), order("B")]);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.duplicates.len(), 2);
        assert_eq!(outcome.duplicates[0].order_id(), "A");
        assert_eq!(outcome.duplicates[1].order_id(), "B");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_try_append_is_all_or_nothing() {
        let store = OrderStore::new();
        assert_eq!(store.try_append(vec![order("A")]).unwrap(), 1);

        let rejected = store
            .try_append(vec![order("B"), order("C"), order("A")])
            .unwrap_err();
        assert_eq!(rejected.index, 2);
        assert_eq!(rejected.error.order_id(), "A");

        let rejected = store
            .try_append(vec![order("D"), order("D")])
            .unwrap_err();
        assert_eq!(rejected.index, 1);

        assert_eq!(store.len(), 1);
        assert!(!store.contains("B"));
        assert!(!store.contains("D"));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let store = OrderStore::new();
        store.append(vec![order("A")]);

        let before = store.snapshot();
        store.append(vec![order("B")]);
        let after = store.snapshot();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(OrderStore::new());

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.append(vec![order(&format!("W{}-{}", w, i))]);
                        let snapshot = store.snapshot();
                        assert!(!snapshot.is_empty());
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
