use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use validator::ValidationErrors;

/// Numeric field that clients may send either as a JSON number or as a
/// numeric string (`"3"`, `" 2.5 "`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumericInput::Number(value) => *value,
            NumericInput::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<i64> for NumericInput {
    fn from(value: i64) -> Self {
        NumericInput::Number(value as f64)
    }
}

/// Which end of a range a date-only value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date. Date-only values
/// become the first instant of the day for `Bound::Start` and the last for
/// `Bound::End`, so `to=2024-01-31` includes sales made that day.
pub fn parse_instant(raw: &str, bound: Bound) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        // timestamptz keeps microseconds.
        Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)?,
    };
    Some(date.and_time(time).and_utc())
}

/// Flattens validator output into a single human-readable line.
pub fn describe_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, field_errors)| {
            let detail = field_errors
                .iter()
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{field}: {detail}")
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
