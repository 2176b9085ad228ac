//! Body validation.
//!
//! A body type describes its shape with a [`BodySchema`]: an ordered list of
//! fields, each carrying a list of [`Rule`]s. A [`ValidationEngine`] checks
//! a [`Value`] against a schema and returns every field that failed.
//!
//! Errors use the field/constraints layout that class-validator popularised:
//!
//! ```json
//! {"property": "bord", "value": "x", "constraints": {"isDate": "bord must be a Date instance"}}
//! ```
//!
//! # Example
//!
//! ```
//! use trellis_core::validation::{BodySchema, Rule, RuleValidator};
//! use trellis_core::{transform_json_with_dates, Value};
//! use serde_json::json;
//!
//! let schema = BodySchema::new("BodyRequest")
//!     .field("age", [Rule::IsString])
//!     .field("bord", [Rule::IsDate]);
//!
//! let body = transform_json_with_dates(&json!({"age": "x", "bord": "not-a-date"}));
//! let errors = RuleValidator::new().check(&schema, &body);
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].property, "bord");
//! ```

use crate::value::Value;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// A single constraint on a body field.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must be a string (dates do not count).
    IsString,
    /// Value must be a date, i.e. an ISO-8601 string in the raw body.
    IsDate,
    /// Value must be a number.
    IsNumber,
    /// Value must be an integer number.
    IsInt,
    /// Value must be a boolean.
    IsBoolean,
    /// Value must not be null, `""`, `[]` or `{}`.
    IsNotEmpty,
    /// A missing or null field skips every other rule.
    IsOptional,
    /// String length lower bound, in characters.
    MinLength(usize),
    /// String length upper bound, in characters.
    MaxLength(usize),
    /// Numeric lower bound.
    Min(f64),
    /// Numeric upper bound.
    Max(f64),
    /// String must match the pattern.
    Matches(Regex),
    /// Value must be an object satisfying the nested schema.
    Nested(Box<BodySchema>),
}

impl Rule {
    /// Constraint key as reported in [`FieldError::constraints`].
    pub const fn constraint(&self) -> &'static str {
        match self {
            Self::IsString => "isString",
            Self::IsDate => "isDate",
            Self::IsNumber => "isNumber",
            Self::IsInt => "isInt",
            Self::IsBoolean => "isBoolean",
            Self::IsNotEmpty => "isNotEmpty",
            Self::IsOptional => "isOptional",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Matches(_) => "matches",
            Self::Nested(_) => "nestedValidation",
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            Self::IsString => format!("{field} must be a string"),
            Self::IsDate => format!("{field} must be a Date instance"),
            Self::IsNumber => {
                format!("{field} must be a number conforming to the specified constraints")
            }
            Self::IsInt => format!("{field} must be an integer number"),
            Self::IsBoolean => format!("{field} must be a boolean value"),
            Self::IsNotEmpty => format!("{field} should not be empty"),
            Self::IsOptional => String::new(),
            Self::MinLength(n) => {
                format!("{field} must be longer than or equal to {n} characters")
            }
            Self::MaxLength(n) => {
                format!("{field} must be shorter than or equal to {n} characters")
            }
            Self::Min(n) => format!("{field} must not be less than {n}"),
            Self::Max(n) => format!("{field} must not be greater than {n}"),
            Self::Matches(re) => format!("{field} must match /{}/ regular expression", re.as_str()),
            Self::Nested(_) => format!("nested property {field} must be an object"),
        }
    }

    fn holds(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return matches!(self, Self::IsOptional);
        };
        match self {
            Self::IsString => matches!(value, Value::String(_)),
            Self::IsDate => matches!(value, Value::Date(_)),
            Self::IsNumber => matches!(value, Value::Number(_)),
            Self::IsInt => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                _ => false,
            },
            Self::IsBoolean => matches!(value, Value::Bool(_)),
            Self::IsNotEmpty => !value.is_empty(),
            Self::IsOptional => true,
            Self::MinLength(n) => value.as_str().is_some_and(|s| s.chars().count() >= *n),
            Self::MaxLength(n) => value.as_str().is_some_and(|s| s.chars().count() <= *n),
            Self::Min(n) => value.as_f64().is_some_and(|v| v >= *n),
            Self::Max(n) => value.as_f64().is_some_and(|v| v <= *n),
            Self::Matches(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Self::Nested(_) => matches!(value, Value::Object(_)),
        }
    }
}

/// A named field and its rules.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    name: String,
    rules: Vec<Rule>,
}

impl FieldSchema {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn is_optional(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::IsOptional))
    }
}

/// The declared shape of a body type.
#[derive(Debug, Clone)]
pub struct BodySchema {
    name: String,
    fields: Vec<FieldSchema>,
}

impl BodySchema {
    /// Creates an empty schema for the type called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field with its rules.
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            rules: rules.into_iter().collect(),
        });
        self
    }

    /// Type name the schema describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }
}

/// Implemented by types that can be bound from a request body.
///
/// ```
/// use trellis_core::validation::{BodySchema, Rule, Validate};
///
/// #[derive(serde::Deserialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// impl Validate for CreateUser {
///     fn schema() -> BodySchema {
///         BodySchema::new("CreateUser").field("name", [Rule::IsString, Rule::IsNotEmpty])
///     }
/// }
/// ```
pub trait Validate {
    /// Returns the schema checked against incoming bodies.
    fn schema() -> BodySchema;
}

/// A failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name; empty for the body itself.
    pub property: String,
    /// The value that was received, absent if the field was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Failed constraint keys mapped to messages.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, String>,
    /// Errors of a nested object.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldError>,
}

impl FieldError {
    /// Creates an error with no constraints yet.
    pub fn new(property: impl Into<String>, value: Option<&Value>) -> Self {
        Self {
            property: property.into(),
            value: value.map(Value::to_json),
            constraints: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Adds a failed constraint.
    pub fn with_constraint(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), message.into());
        self
    }
}

/// Checks an instance against declared field constraints.
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    /// Returns every failed field; an empty list means the instance is valid.
    async fn validate(&self, schema: &BodySchema, instance: &Value) -> Vec<FieldError>;
}

/// The built-in [`ValidationEngine`] that evaluates [`Rule`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    /// Creates the validator.
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous form of [`ValidationEngine::validate`].
    pub fn check(&self, schema: &BodySchema, instance: &Value) -> Vec<FieldError> {
        let Some(fields) = instance.as_object() else {
            return vec![FieldError::new("", Some(instance))
                .with_constraint("isObject", "body must be an object")];
        };

        let mut errors = Vec::new();
        for field in &schema.fields {
            let value = fields.get(&field.name).filter(|v| !v.is_null());
            if value.is_none() && field.is_optional() {
                continue;
            }

            let mut error = FieldError::new(field.name.clone(), value);
            for rule in &field.rules {
                if !rule.holds(value) {
                    error.constraints.insert(
                        rule.constraint().to_string(),
                        rule.message(&field.name),
                    );
                } else if let (Rule::Nested(inner), Some(nested)) = (rule, value) {
                    error.children = self.check(inner, nested);
                }
            }

            if !error.constraints.is_empty() || !error.children.is_empty() {
                errors.push(error);
            }
        }
        errors
    }
}

#[async_trait]
impl ValidationEngine for RuleValidator {
    async fn validate(&self, schema: &BodySchema, instance: &Value) -> Vec<FieldError> {
        self.check(schema, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::transform_json_with_dates;
    use serde_json::json;

    fn profile_schema() -> BodySchema {
        BodySchema::new("BodyRequest")
            .field("age", [Rule::IsString])
            .field("bord", [Rule::IsDate])
    }

    fn check(schema: &BodySchema, body: serde_json::Value) -> Vec<FieldError> {
        RuleValidator::new().check(schema, &transform_json_with_dates(&body))
    }

    #[test]
    fn test_valid_body() {
        let errors = check(&profile_schema(), json!({"age": "30", "bord": "1990-01-01"}));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_invalid_date_field() {
        let errors = check(&profile_schema(), json!({"age": "x", "bord": "not-a-date"}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "bord");
        assert_eq!(errors[0].value, Some(json!("not-a-date")));
        assert_eq!(
            errors[0].constraints.get("isDate").map(String::as_str),
            Some("bord must be a Date instance")
        );
    }

    #[test]
    fn test_all_field_errors_aggregated_in_order() {
        let errors = check(&profile_schema(), json!({"age": 5}));
        let props: Vec<_> = errors.iter().map(|e| e.property.as_str()).collect();
        assert_eq!(props, ["age", "bord"]);
        assert_eq!(errors[1].value, None);
    }

    #[test]
    fn test_date_string_is_not_a_string() {
        let schema = BodySchema::new("T").field("name", [Rule::IsString]);
        let errors = check(&schema, json!({"name": "2020-01-01"}));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_non_object_body() {
        let errors = check(&profile_schema(), json!(null));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "");
        assert!(errors[0].constraints.contains_key("isObject"));

        assert_eq!(check(&profile_schema(), json!([1, 2])).len(), 1);
    }

    #[test]
    fn test_optional_field_skipped_when_absent() {
        let schema = BodySchema::new("T").field("nick", [Rule::IsOptional, Rule::IsString]);
        assert!(check(&schema, json!({})).is_empty());
        assert!(check(&schema, json!({"nick": null})).is_empty());
        assert_eq!(check(&schema, json!({"nick": 1})).len(), 1);
    }

    #[test]
    fn test_multiple_constraints_on_one_field() {
        let schema = BodySchema::new("T").field("name", [Rule::IsString, Rule::MinLength(3)]);
        let errors = check(&schema, json!({"name": 7}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraints.len(), 2);
    }

    #[test]
    fn test_numeric_rules() {
        let schema = BodySchema::new("T").field("n", [Rule::IsInt, Rule::Min(1.0), Rule::Max(10.0)]);
        assert!(check(&schema, json!({"n": 5})).is_empty());
        let errors = check(&schema, json!({"n": 11.5}));
        assert!(errors[0].constraints.contains_key("isInt"));
        assert!(errors[0].constraints.contains_key("max"));
    }

    #[test]
    fn test_matches_and_length() {
        let schema = BodySchema::new("T").field(
            "code",
            [Rule::Matches(Regex::new("^[A-Z]+$").unwrap()), Rule::MaxLength(3)],
        );
        assert!(check(&schema, json!({"code": "ABC"})).is_empty());
        let errors = check(&schema, json!({"code": "abcd"}));
        assert_eq!(errors[0].constraints.len(), 2);
    }

    #[test]
    fn test_nested_schema_reports_children() {
        let address = BodySchema::new("Address").field("city", [Rule::IsString, Rule::IsNotEmpty]);
        let schema = BodySchema::new("User").field("address", [Rule::Nested(Box::new(address))]);

        let errors = check(&schema, json!({"address": {"city": ""}}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].constraints.is_empty());
        assert_eq!(errors[0].children[0].property, "city");

        let not_object = check(&schema, json!({"address": "Paris"}));
        assert!(not_object[0].constraints.contains_key("nestedValidation"));
    }

    #[test]
    fn test_field_error_serialization() {
        let errors = check(&profile_schema(), json!({"age": "x", "bord": "nope"}));
        let serialized = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            serialized,
            json!([{
                "property": "bord",
                "value": "nope",
                "constraints": {"isDate": "bord must be a Date instance"}
            }])
        );
    }

    #[tokio::test]
    async fn test_engine_trait_delegates() {
        let engine: &dyn ValidationEngine = &RuleValidator::new();
        let body = transform_json_with_dates(&json!({"age": "1", "bord": "2020-01-01"}));
        assert!(engine.validate(&profile_schema(), &body).await.is_empty());
    }
}
