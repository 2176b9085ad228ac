//! Resolution failure types.
//!
//! A [`ValidationFailure`] is the caller's fault and becomes a `400` with a
//! structured body. Every other [`ResolveError`] is treated as a server-side
//! failure.

use http::StatusCode;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use trellis_core::{FieldError, InjectionError, SourceKind, StringFormat};

/// Message carried by every validation failure.
pub const BAD_REQUEST_MESSAGE: &str = "Bad request";

/// What kind of check produced a [`ValidationFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required value was missing or empty.
    Required,
    /// A value did not satisfy its declared format.
    Format,
    /// The body failed schema validation.
    Body,
    /// The body was not valid JSON or the query could not be decoded.
    Malformed,
}

impl FailureKind {
    /// Short label, used as a metrics dimension.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Format => "format",
            Self::Body => "body",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request rejected during argument resolution.
///
/// Serializes as the response body:
///
/// ```json
/// {"code": 400, "message": "Bad request", "cause": "Required query \"userId\" not found"}
/// ```
///
/// # Example
///
/// ```
/// use trellis_extract::ValidationFailure;
/// use trellis_core::SourceKind;
///
/// let failure = ValidationFailure::required(SourceKind::Query, "userId");
/// assert_eq!(failure.cause, "Required query \"userId\" not found");
/// assert_eq!(failure.code, 400);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}: {cause}")]
pub struct ValidationFailure {
    /// HTTP status, always `400`.
    pub code: u16,
    /// Always [`BAD_REQUEST_MESSAGE`].
    pub message: String,
    /// What went wrong.
    pub cause: String,
    /// Extra structured information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip)]
    kind: FailureKind,
}

impl ValidationFailure {
    fn new(kind: FailureKind, cause: String, details: Option<serde_json::Value>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST.as_u16(),
            message: BAD_REQUEST_MESSAGE.to_string(),
            cause,
            details,
            kind,
        }
    }

    /// A required value was absent or empty.
    pub fn required(kind: SourceKind, name: &str) -> Self {
        Self::new(
            FailureKind::Required,
            format!("Required {kind} \"{name}\" not found"),
            None,
        )
    }

    /// A value did not satisfy its declared format.
    pub fn invalid_format(kind: SourceKind, name: &str, value: &str, format: StringFormat) -> Self {
        Self::new(
            FailureKind::Format,
            format!("Invalid format of {kind} \"{name}\"."),
            Some(serde_json::Value::String(format!(
                "\"{value}\" received, {format} required."
            ))),
        )
    }

    /// The body failed schema validation.
    pub fn body_validation(errors: &[FieldError]) -> Self {
        Self::new(
            FailureKind::Body,
            "Body validation failed".to_string(),
            serde_json::to_value(errors).ok(),
        )
    }

    /// The body was not valid JSON.
    pub fn invalid_json(reason: impl fmt::Display) -> Self {
        Self::new(
            FailureKind::Malformed,
            "Invalid JSON body".to_string(),
            Some(serde_json::Value::String(reason.to_string())),
        )
    }

    /// The query string could not be decoded.
    pub fn invalid_query(reason: impl fmt::Display) -> Self {
        Self::new(
            FailureKind::Malformed,
            "Invalid query string".to_string(),
            Some(serde_json::Value::String(reason.to_string())),
        )
    }

    /// Which check failed.
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Always `400 Bad Request`.
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Why argument resolution did not produce an argument list.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The request is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// A declared service could not be resolved.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// A configured resolution deadline expired.
    #[error("argument resolution timed out after {0:?}")]
    Timeout(Duration),
}

impl ResolveError {
    /// HTTP status for the error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Injection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}
