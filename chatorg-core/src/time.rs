//! Normalization of remote timestamp fields into epoch milliseconds.
//!
//! The API reports `create_time` / `update_time` as epoch seconds, epoch
//! milliseconds, numeric strings or RFC 3339 strings depending on the
//! endpoint. Magnitude decides the unit for numbers:
//!
//! - above `1e12`: milliseconds
//! - above `1e10`: milliseconds
//! - anything else: seconds, scaled by 1000
//!
//! Values that cannot be interpreted yield `None`; an absent timestamp is
//! a normal state for a row, not an error.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::client::ItemRow;

const MS_THRESHOLD: f64 = 1e12;
const MS_ISH_THRESHOLD: f64 = 1e10;

pub fn parse_time_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_f64().and_then(number_to_ms),
        Value::String(text) => parse_text_ms(text),
        _ => None,
    }
}

/// Best-known timestamp of a row: `update_time`, falling back to `create_time`.
pub fn row_updated_ms(row: &ItemRow) -> Option<i64> {
    row.update_time
        .as_ref()
        .and_then(parse_time_ms)
        .or_else(|| row.create_time.as_ref().and_then(parse_time_ms))
}

fn number_to_ms(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    if value > MS_THRESHOLD || value > MS_ISH_THRESHOLD {
        Some(value.floor() as i64)
    } else {
        Some((value * 1000.0).floor() as i64)
    }
}

fn parse_text_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(number) = text.parse::<f64>() {
        return number_to_ms(number);
    }
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some((parsed.unix_timestamp_nanos() / 1_000_000) as i64);
    }
    let date = Date::parse(text, format_description!("[year]-[month]-[day]")).ok()?;
    Some(date.midnight().assume_utc().unix_timestamp() * 1000)
}
