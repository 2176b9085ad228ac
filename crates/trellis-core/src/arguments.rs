//! Resolved handler arguments.

use crate::di::ServiceInstance;
use crate::error::HandlerError;
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// One resolved argument.
#[derive(Clone)]
pub enum Argument {
    /// Absent or empty value.
    Null,
    /// Raw string from the query or the path.
    Text(String),
    /// Validated body, with dates already converted.
    Body(Value),
    /// Injected service instance.
    Service(ServiceInstance),
}

impl Argument {
    /// Short name of the variant.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Body(_) => "body",
            Self::Service(_) => "service",
        }
    }

    /// Returns `true` for `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Body(v) => f.debug_tuple("Body").field(v).finish(),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// The ordered argument list passed to a handler.
///
/// Position `i` holds the value declared at index `i`. The typed accessors
/// fail with [`HandlerError::ArgumentType`] when a handler reads a position
/// with the wrong accessor.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolved value.
    pub fn push(&mut self, argument: Argument) {
        self.values.push(argument);
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw access by position.
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    /// Iterates in positional order.
    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.values.iter()
    }

    /// A query or path value that must be present.
    pub fn text(&self, index: usize) -> Result<&str, HandlerError> {
        match self.get(index) {
            Some(Argument::Text(s)) => Ok(s),
            other => Err(mismatch(index, "text", other)),
        }
    }

    /// A query or path value that may be absent.
    pub fn optional_text(&self, index: usize) -> Result<Option<&str>, HandlerError> {
        match self.get(index) {
            Some(Argument::Text(s)) => Ok(Some(s)),
            Some(Argument::Null) => Ok(None),
            other => Err(mismatch(index, "text", other)),
        }
    }

    /// The validated body as a [`Value`].
    pub fn body_value(&self, index: usize) -> Result<&Value, HandlerError> {
        match self.get(index) {
            Some(Argument::Body(v)) => Ok(v),
            other => Err(mismatch(index, "body", other)),
        }
    }

    /// The validated body deserialized into `T`.
    ///
    /// Dates are handed to serde as RFC 3339 strings, which `chrono` types
    /// deserialize directly.
    pub fn body<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        let value = self.body_value(index)?;
        serde_json::from_value(value.to_json())
            .map_err(|source| HandlerError::BodyConversion { index, source })
    }

    /// An injected service.
    pub fn service<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, HandlerError> {
        match self.get(index) {
            Some(Argument::Service(instance)) => instance
                .clone()
                .downcast::<T>()
                .map_err(|_| HandlerError::ArgumentType {
                    index,
                    expected: std::any::type_name::<T>(),
                    found: "service of another type",
                }),
            other => Err(mismatch(index, "service", other)),
        }
    }
}

impl FromIterator<Argument> for Arguments {
    fn from_iter<I: IntoIterator<Item = Argument>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn mismatch(index: usize, expected: &'static str, found: Option<&Argument>) -> HandlerError {
    HandlerError::ArgumentType {
        index,
        expected,
        found: found.map_or("nothing", Argument::kind),
    }
}
