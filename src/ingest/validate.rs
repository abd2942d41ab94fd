//! Row validation into `OrderRecord`s.

use super::reader::{Flag, NumberedRow, RawOrderRow};
use crate::error::ValidationError;
use crate::models::{normalize_state, Carrier, OrderRecord, RouteScore, ServiceLevel};
use chrono::NaiveDate;
use std::str::FromStr;

/// Largest accepted per-order delivery cost, in currency units.
pub const MAX_DELIVERY_COST: f64 = 1_000_000.0;

/// Turns raw rows into validated records.
#[derive(Debug, Clone)]
pub struct RowValidator {
    date_format: String,
}

impl Default for RowValidator {
    fn default() -> Self {
        Self::new("%Y-%m-%d")
    }
}

impl RowValidator {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    /// Validate one row, naming the first violated invariant on failure.
    pub fn validate(&self, numbered: NumberedRow) -> Result<OrderRecord, ValidationError> {
        let NumberedRow { line, row } = numbered;
        let RawOrderRow {
            order_id,
            service_level,
            is_prime_member,
            carrier,
            destination_state,
            destination_city,
            order_date,
            delivery_date,
            promised_delivery_date,
            route_score,
            delivery_cost,
        } = row;

        let order_id = match non_blank(order_id) {
            Some(id) => id,
            None => {
                return Err(ValidationError::MissingField {
                    order_id: format!("row {}", line),
                    field: "order_id",
                })
            }
        };
        let id = order_id.as_str();

        let service_level = parse_service_level(id, service_level, is_prime_member)?;
        let carrier: Carrier = parse_enum(id, "carrier", carrier)?;
        let route_score: RouteScore = parse_enum(id, "route_score", route_score)?;

        let destination_state = normalize_state(&required(id, "destination_state", destination_state)?);
        let destination_city = required(id, "destination_city", destination_city)?;

        let order_date = self.parse_date(id, "order_date", order_date)?;
        let delivery_date = self.parse_date(id, "delivery_date", delivery_date)?;
        let promised_delivery_date =
            self.parse_date(id, "promised_delivery_date", promised_delivery_date)?;

        if delivery_date < order_date {
            return Err(ValidationError::DeliveryBeforeOrder {
                order_id,
                order_date,
                delivery_date,
            });
        }

        let delivery_cost_cents = match delivery_cost {
            Some(cost) if !(0.0..=MAX_DELIVERY_COST).contains(&cost) => {
                return Err(ValidationError::InvalidCost {
                    order_id,
                    cost,
                    max: MAX_DELIVERY_COST,
                })
            }
            Some(cost) => Some((cost * 100.0).round() as i64),
            None => None,
        };

        Ok(OrderRecord {
            order_id,
            service_level,
            carrier,
            destination_state,
            destination_city,
            order_date,
            delivery_date,
            promised_delivery_date,
            route_score,
            delivery_cost_cents,
        })
    }

    fn parse_date(
        &self,
        order_id: &str,
        field: &'static str,
        value: Option<String>,
    ) -> Result<NaiveDate, ValidationError> {
        let value = required(order_id, field, value)?;

        // Timestamp exports carry a time part after the date
        let date_part = value
            .split(|c: char| c == 'T' || c.is_whitespace())
            .next()
            .unwrap_or(&value);

        NaiveDate::parse_from_str(&value, &self.date_format)
            .or_else(|_| NaiveDate::parse_from_str(date_part, &self.date_format))
            .map_err(|_| ValidationError::InvalidDate {
                order_id: order_id.to_string(),
                field,
                value: value.clone(),
                format: self.date_format.clone(),
            })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    order_id: &str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, ValidationError> {
    non_blank(value).ok_or_else(|| ValidationError::MissingField {
        order_id: order_id.to_string(),
        field,
    })
}

fn parse_enum<T: FromStr>(
    order_id: &str,
    field: &'static str,
    value: Option<String>,
) -> Result<T, ValidationError> {
    let value = required(order_id, field, value)?;
    value.parse().map_err(|_| ValidationError::InvalidValue {
        order_id: order_id.to_string(),
        field,
        value,
    })
}

/// `service_level` wins; otherwise fall back to the `is_prime_member` flag.
fn parse_service_level(
    order_id: &str,
    service_level: Option<String>,
    is_prime_member: Option<Flag>,
) -> Result<ServiceLevel, ValidationError> {
    if let Some(level) = non_blank(service_level) {
        return parse_enum(order_id, "service_level", Some(level));
    }

    match is_prime_member {
        Some(flag) => match flag.as_bool() {
            Some(true) => Ok(ServiceLevel::Prime),
            Some(false) => Ok(ServiceLevel::Standard),
            None => Err(ValidationError::InvalidValue {
                order_id: order_id.to_string(),
                field: "is_prime_member",
                value: flag.to_string(),
            }),
        },
        None => Err(ValidationError::MissingField {
            order_id: order_id.to_string(),
            field: "service_level",
        }),
    }
}
