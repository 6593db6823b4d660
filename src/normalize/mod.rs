//! Upstream payload normalization
//!
//! Each upstream endpoint has its own payload shape:
//! - `earnings` - quarterly history plus a seed for the overview record
//! - `equities` - valuation, margin, growth, dividend and balance-sheet metrics
//!
//! `merge` combines both into one `OverviewMetricsRecord`.

pub mod earnings;
pub mod equities;
pub mod merge;

pub use earnings::EarningsResponse;
pub use equities::EquitiesResponse;
pub use merge::merge_equities;

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a payload whose top level must be a JSON object
///
/// Derived struct impls also accept sequences, so an array body would
/// otherwise decode as an empty response.
pub(crate) fn decode_object<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(AppError::Decode(serde_json::Error::custom(
            "expected a JSON object at the top level",
        )));
    }
    Ok(serde_json::from_value(value)?)
}

/// Parse an optional RFC3339 timestamp; absent or empty means no value
pub(crate) fn parse_rfc3339(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| AppError::field_parse(field, value, e)),
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Treat JSON `null` like a missing key
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
