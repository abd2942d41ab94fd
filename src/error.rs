//! Error types for ingestion and validation.
//!
//! Aggregation itself is total over validated records, so every failure
//! mode lives here: a record is either rejected at ingestion with a
//! [`ValidationError`] or the input could not be read at all.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// A record that violates one of the `OrderRecord` invariants.
///
/// Every variant names the offending `order_id`. When the id itself is
/// missing, the row label (`row 12`) is used instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required column is absent or blank.
    #[error("{order_id}: missing required field `{field}`")]
    MissingField {
        order_id: String,
        field: &'static str,
    },

    /// A categorical column holds a value outside its enum.
    #[error("{order_id}: invalid {field} '{value}'")]
    InvalidValue {
        order_id: String,
        field: &'static str,
        value: String,
    },

    /// A date column does not parse with the configured format.
    #[error("{order_id}: cannot parse {field} '{value}' (expected {format})")]
    InvalidDate {
        order_id: String,
        field: &'static str,
        value: String,
        format: String,
    },

    /// `delivery_date` precedes `order_date`.
    #[error("{order_id}: delivery_date {delivery_date} is before order_date {order_date}")]
    DeliveryBeforeOrder {
        order_id: String,
        order_date: NaiveDate,
        delivery_date: NaiveDate,
    },

    /// Cost is negative, above the accepted ceiling, NaN or infinite.
    #[error("{order_id}: delivery cost {cost} must be between 0 and {max}")]
    InvalidCost {
        order_id: String,
        cost: f64,
        max: f64,
    },

    /// The `order_id` has already been ingested.
    #[error("{order_id}: duplicate order_id")]
    DuplicateOrderId { order_id: String },
}

impl ValidationError {
    /// The order (or row label) the error refers to.
    pub fn order_id(&self) -> &str {
        match self {
            ValidationError::MissingField { order_id, .. }
            | ValidationError::InvalidValue { order_id, .. }
            | ValidationError::InvalidDate { order_id, .. }
            | ValidationError::DeliveryBeforeOrder { order_id, .. }
            | ValidationError::InvalidCost { order_id, .. }
            | ValidationError::DuplicateOrderId { order_id } => order_id,
        }
    }

    /// Short name of the violated invariant, used in logs and summaries.
    pub fn invariant(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "required-field",
            ValidationError::InvalidValue { .. } => "enum-value",
            ValidationError::InvalidDate { .. } => "date-format",
            ValidationError::DeliveryBeforeOrder { .. } => "delivery-after-order",
            ValidationError::InvalidCost { .. } => "cost-range",
            ValidationError::DuplicateOrderId { .. } => "unique-order-id",
        }
    }
}

/// Failures while reading input files into the record store.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed CSV in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid record in {}: {source}", .path.display())]
    Validation {
        path: PathBuf,
        source: ValidationError,
    },

    #[error("Unsupported input file (expected .csv or .json): {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("No .csv or .json input files found in: {paths}")]
    NoInputs { paths: String },

    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_order() {
        let err = ValidationError::DeliveryBeforeOrder {
            order_id: "ORD-0000042".to_string(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
        };

        assert_eq!(err.order_id(), "ORD-0000042");
        assert_eq!(err.invariant(), "delivery-after-order");

        let message = err.to_string();
        assert!(message.contains("ORD-0000042"));
        assert!(message.contains("2024-03-08"));
        assert!(message.contains("2024-03-10"));
    }

    #[test]
    fn test_ingest_error_wraps_validation() {
        let err = IngestError::Validation {
            path: PathBuf::from("data/orders.csv"),
            source: ValidationError::DuplicateOrderId {
                order_id: "ORD-1".to_string(),
            },
        };

        let message = err.to_string();
        assert!(message.contains("data/orders.csv"));
        assert!(message.contains("ORD-1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
