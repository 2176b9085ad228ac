//! Raw, untyped request input.

use crate::error::ValidationFailure;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Everything the resolver reads from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    query: IndexMap<String, String>,
    path_params: HashMap<String, String>,
    body: serde_json::Value,
}

impl RawInput {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the input from the raw pieces of a request.
    ///
    /// A repeated query key keeps its last value. Pass `None` as the body
    /// when the endpoint never reads it; the bytes are then left unparsed.
    /// An empty body reads as `null`, anything else must be valid JSON.
    pub fn from_parts(
        query: Option<&str>,
        path_params: HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<Self, ValidationFailure> {
        Ok(Self {
            query: parse_query(query.unwrap_or_default())?,
            path_params,
            body: body.map_or(Ok(serde_json::Value::Null), parse_body)?,
        })
    }

    /// Adds a query pair.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Adds a path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// Query value by key.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Path parameter by placeholder name.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// The JSON body, `null` if none was sent.
    pub const fn body(&self) -> &serde_json::Value {
        &self.body
    }
}

fn parse_query(query: &str) -> Result<IndexMap<String, String>, ValidationFailure> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(ValidationFailure::invalid_query)?;
    Ok(pairs.into_iter().collect())
}

fn parse_body(body: &[u8]) -> Result<serde_json::Value, ValidationFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(ValidationFailure::invalid_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_parts() {
        let mut params = HashMap::new();
        params.insert("age".to_string(), "30".to_string());

        let body = br#"{"k": 1}"#;
        let input =
            RawInput::from_parts(Some("userId=42&x=a%20b"), params, Some(body.as_slice())).unwrap();
        assert_eq!(input.query("userId"), Some("42"));
        assert_eq!(input.query("x"), Some("a b"));
        assert_eq!(input.query("missing"), None);
        assert_eq!(input.path_param("age"), Some("30"));
        assert_eq!(input.body(), &json!({"k": 1}));
    }

    #[test]
    fn test_repeated_query_key_keeps_last() {
        let input = RawInput::from_parts(Some("a=1&a=2"), HashMap::new(), Some(b"".as_slice())).unwrap();
        assert_eq!(input.query("a"), Some("2"));
    }

    #[test]
    fn test_empty_query_value() {
        let input = RawInput::from_parts(Some("a="), HashMap::new(), Some(b"".as_slice())).unwrap();
        assert_eq!(input.query("a"), Some(""));
    }

    #[test]
    fn test_empty_body_is_null() {
        let input = RawInput::from_parts(None, HashMap::new(), Some(b"  \n".as_slice())).unwrap();
        assert!(input.body().is_null());
    }

    #[test]
    fn test_invalid_json_body() {
        let failure =
            RawInput::from_parts(None, HashMap::new(), Some(b"{oops".as_slice())).unwrap_err();
        assert_eq!(failure.cause, "Invalid JSON body");
        assert!(failure.details.is_some());
    }

    #[test]
    fn test_unread_body_is_not_parsed() {
        let input = RawInput::from_parts(None, HashMap::new(), None).unwrap();
        assert!(input.body().is_null());
    }

    #[test]
    fn test_builder() {
        let input = RawInput::new()
            .with_query("q", "1")
            .with_path_param("id", "7")
            .with_body(json!([1]));
        assert_eq!(input.query("q"), Some("1"));
        assert_eq!(input.path_param("id"), Some("7"));
        assert_eq!(input.body(), &json!([1]));
    }
}
