//! Delivery performance analysis.
//!
//! Filtering, single-pass aggregation, and the query engine that runs
//! them against a consistent snapshot of the record store.

pub mod aggregator;
pub mod engine;
pub mod filter;

pub use engine::Engine;
pub use filter::FilterContext;
