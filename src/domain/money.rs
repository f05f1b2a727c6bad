//! Conversions between stored integer cents and the decimal amounts exposed
//! over the API.
//!
//! Prices and totals are persisted as `BIGINT` cents so that
//! `price × quantity` is exact; the two-decimal rounding required at the
//! reporting boundary therefore only ever happens on division (averages).

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn cents_to_amount(cents: i64) -> f64 {
    round2(cents as f64 / 100.0)
}

/// Converts a non-negative decimal amount to cents. Returns `None` for
/// negative, non-finite, or out-of-range input.
pub fn amount_to_cents(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let cents = (amount * 100.0).round();
    if cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_amounts_without_float_drift() {
        assert_eq!(amount_to_cents(2.0), Some(200));
        assert_eq!(amount_to_cents(0.1 + 0.2), Some(30));
        assert_eq!(amount_to_cents(19.999), Some(2000));
        assert_eq!(cents_to_amount(600), 6.0);
        assert_eq!(cents_to_amount(1099), 10.99);
    }

    #[test]
    fn rejects_negative_and_non_finite_amounts() {
        assert_eq!(amount_to_cents(-0.01), None);
        assert_eq!(amount_to_cents(f64::NAN), None);
        assert_eq!(amount_to_cents(f64::INFINITY), None);
    }

    #[test]
    fn round2_rounds_to_cents() {
        assert_eq!(round2(1.256), 1.26);
        assert_eq!(round2(-1.256), -1.26);
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(0.0), 0.0);
    }
}
