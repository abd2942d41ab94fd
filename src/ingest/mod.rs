//! Order ingestion.
//!
//! Discovers input files, parses rows, validates them into `OrderRecord`s
//! and appends them to the shared record store.

pub mod loader;
pub mod reader;
pub mod validate;

pub use loader::{load_inputs, IngestOptions, IngestSummary};
pub use reader::RawOrderRow;
