//! Deep conversion of ISO-8601 strings into structured dates.
//!
//! Request bodies arrive as plain JSON. Before a body is validated, every
//! string that reads as an ISO-8601 date is replaced with [`Value::Date`],
//! so that date rules can check a real date rather than a string.

use crate::format::parse_iso8601;
use crate::value::Value;

/// Walks `json` and converts every ISO-8601 string into [`Value::Date`].
///
/// Arrays keep their order and length, and objects keep their key set.
/// Other values pass through unchanged.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trellis_core::{transform_json_with_dates, Value};
///
/// let value = transform_json_with_dates(&json!({"a": "2020-01-01T00:00:00.000Z", "b": 3}));
/// assert!(value.get("a").and_then(Value::as_date).is_some());
/// assert_eq!(value.get("b"), Some(&Value::from(3)));
/// ```
pub fn transform_json_with_dates(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::String(s) => match parse_iso8601(s) {
            Some(date) => Value::Date(date),
            None => Value::String(s.clone()),
        },
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(transform_json_with_dates).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), transform_json_with_dates(v)))
                .collect(),
        ),
        other => Value::from_json(other),
    }
}
