//! Quantity rules for stock adjustments and sales.
//!
//! These functions validate raw client input and compute the resulting
//! quantity; the services apply the same rules through conditional SQL
//! updates so that the check and the write cannot be separated by a
//! concurrent writer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Increase,
    Decrease,
    Set,
}

impl StockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::Increase => "increase",
            StockOperation::Decrease => "decrease",
            StockOperation::Set => "set",
        }
    }

    fn minimum(&self) -> i32 {
        match self {
            StockOperation::Set => 0,
            StockOperation::Increase | StockOperation::Decrease => 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StockError {
    #[error("{0}")]
    InvalidAmount(String),
    #[error("insufficient stock: requested {requested}, available {available}")]
    Insufficient { available: i32, requested: i32 },
}

/// A validated stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub operation: StockOperation,
    pub amount: i32,
}

impl StockAdjustment {
    /// Truncates `raw` toward zero, then checks it against the operation's
    /// minimum (`1` for increase/decrease, `0` for set).
    pub fn parse(operation: StockOperation, raw: Option<f64>) -> Result<Self, StockError> {
        let amount = truncate_count(raw).ok_or_else(|| {
            StockError::InvalidAmount("amount must be a whole number".to_string())
        })?;
        if amount < operation.minimum() {
            let message = match operation {
                StockOperation::Set => "amount must be zero or greater".to_string(),
                _ => format!("amount must be at least 1 to {}", operation.as_str()),
            };
            return Err(StockError::InvalidAmount(message));
        }
        Ok(Self { operation, amount })
    }

    pub fn apply(&self, current: i32) -> Result<i32, StockError> {
        match self.operation {
            StockOperation::Increase => current.checked_add(self.amount).ok_or_else(|| {
                StockError::InvalidAmount("resulting quantity is too large".to_string())
            }),
            StockOperation::Decrease if self.amount > current => Err(StockError::Insufficient {
                available: current,
                requested: self.amount,
            }),
            StockOperation::Decrease => Ok(current - self.amount),
            StockOperation::Set => Ok(self.amount),
        }
    }
}

/// Validates a quantity sold: it must truncate to a positive integer.
pub fn parse_sale_quantity(raw: Option<f64>) -> Result<i32, StockError> {
    match truncate_count(raw) {
        Some(quantity) if quantity >= 1 => Ok(quantity),
        _ => Err(StockError::InvalidAmount(
            "quantitySold must be a positive integer".to_string(),
        )),
    }
}

/// Checks a sale against the quantity on hand and returns the remaining stock.
pub fn check_sale(available: i32, requested: i32) -> Result<i32, StockError> {
    if available < requested {
        return Err(StockError::Insufficient {
            available,
            requested,
        });
    }
    Ok(available - requested)
}

/// Sale totals are exact in cents, which is `round2(price * quantity)`.
pub fn sale_total_cents(price_cents: i64, quantity: i32) -> i64 {
    price_cents * i64::from(quantity)
}

fn truncate_count(raw: Option<f64>) -> Option<i32> {
    let value = raw?.trunc();
    if !value.is_finite() || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrease_beyond_quantity_is_rejected() {
        let adjustment = StockAdjustment::parse(StockOperation::Decrease, Some(8.0)).unwrap();
        assert_eq!(
            adjustment.apply(7),
            Err(StockError::Insufficient {
                available: 7,
                requested: 8
            })
        );
        assert_eq!(adjustment.apply(8), Ok(0));
    }

    #[test]
    fn set_accepts_zero_and_replaces_quantity() {
        let adjustment = StockAdjustment::parse(StockOperation::Set, Some(0.0)).unwrap();
        assert_eq!(adjustment.apply(42), Ok(0));
        let adjustment = StockAdjustment::parse(StockOperation::Set, Some(13.0)).unwrap();
        assert_eq!(adjustment.apply(2), Ok(13));
    }

    #[test]
    fn increase_and_decrease_require_at_least_one() {
        assert!(StockAdjustment::parse(StockOperation::Increase, Some(0.0)).is_err());
        assert!(StockAdjustment::parse(StockOperation::Decrease, Some(0.9)).is_err());
        assert!(StockAdjustment::parse(StockOperation::Set, Some(-1.0)).is_err());
        assert!(StockAdjustment::parse(StockOperation::Increase, None).is_err());
    }

    #[test]
    fn fractional_amounts_are_truncated() {
        let adjustment = StockAdjustment::parse(StockOperation::Increase, Some(3.9)).unwrap();
        assert_eq!(adjustment.amount, 3);
        assert_eq!(adjustment.apply(2), Ok(5));
    }

    #[test]
    fn increase_overflow_is_rejected() {
        let adjustment = StockAdjustment::parse(StockOperation::Increase, Some(10.0)).unwrap();
        assert!(matches!(
            adjustment.apply(i32::MAX - 5),
            Err(StockError::InvalidAmount(_))
        ));
    }

    #[test]
    fn sale_quantity_must_be_positive() {
        assert_eq!(parse_sale_quantity(Some(3.0)), Ok(3));
        assert_eq!(parse_sale_quantity(Some(2.7)), Ok(2));
        assert!(parse_sale_quantity(Some(0.0)).is_err());
        assert!(parse_sale_quantity(Some(-4.0)).is_err());
        assert!(parse_sale_quantity(None).is_err());
        assert!(parse_sale_quantity(Some(f64::NAN)).is_err());
    }

    #[test]
    fn sale_scenario_matches_expected_totals() {
        // quantity 10, reorder level 5, price 2.00
        assert_eq!(check_sale(10, 3), Ok(7));
        assert_eq!(sale_total_cents(200, 3), 600);
        assert_eq!(
            check_sale(10, 12),
            Err(StockError::Insufficient {
                available: 10,
                requested: 12
            })
        );
    }
}
