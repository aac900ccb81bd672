//! Shared JSON parsing helpers used by both exchange modules.
//!
//! Exchanges encode numbers as either JSON strings (`"30000.5"`) or native
//! numbers (`30000.5`), sometimes in the same payload.

use pw_core::{FetchError, PriceLevel};
use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Render a string-or-number field as an owned string (ids come both ways).
pub fn string_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse `[[price, size], ...]` into levels. Entries that are not
/// two-element arrays of numbers are skipped.
pub fn parse_levels(levels: Option<&Value>) -> Vec<PriceLevel> {
    let Some(arr) = levels.and_then(Value::as_array) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|level| {
            let level = level.as_array()?;
            Some(PriceLevel {
                price: parse_str_f64(level.first())?,
                size: parse_str_f64(level.get(1))?,
            })
        })
        .collect()
}

/// Same as [`parse_levels`] but as `[price, size]` pairs for the order book.
pub fn parse_level_pairs(levels: Option<&Value>) -> Vec<[f64; 2]> {
    parse_levels(levels).into_iter().map(|l| [l.price, l.size]).collect()
}

/// Require a JSON array, failing with `MalformedData` naming `what`.
pub fn expect_array<'a>(v: &'a Value, what: &str) -> Result<&'a Vec<Value>, FetchError> {
    v.as_array()
        .ok_or_else(|| FetchError::MalformedData(format!("{what}: expected array")))
}
