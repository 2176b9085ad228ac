//! Error types for Trellis declarations and handlers.
//!
//! Two failure classes live here:
//!
//! | Type | When | Outcome |
//! |---|---|---|
//! | [`DeclarationError`] | Registration / startup | Aborts application start |
//! | [`HandlerError`] | Inside a request, after resolution | `500 Internal Server Error` |
//!
//! Request-time validation failures are not errors of this crate; they are
//! produced by the argument resolver in `trellis-extract`.

use crate::di::InjectionError;
use crate::endpoint::{HttpMethod, SourceKind};
use thiserror::Error;

/// Result type alias for handler bodies.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// An endpoint declaration that cannot be served.
///
/// Every variant is detected before the server starts listening.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// A body argument was declared on a verb that carries no body.
    #[error("{owner}::{handler}: {method} {path} cannot declare a body argument")]
    BodyNotAllowed {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
        /// Declared verb.
        method: HttpMethod,
        /// Declared path template.
        path: String,
    },

    /// The positional indices of a method skip a value.
    #[error("{owner}::{handler}: no argument declared at position {index}")]
    MissingArgument {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
        /// First index with no definition.
        index: usize,
    },

    /// Two arguments claim the same position.
    #[error("{owner}::{handler}: argument position {index} declared twice")]
    DuplicateArgument {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
        /// Repeated index.
        index: usize,
    },

    /// More than one body argument on a single method.
    #[error("{owner}::{handler}: only one body argument is allowed")]
    MultipleBodies {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
    },

    /// A string format was attached to a source that is not a string.
    #[error("{owner}::{handler}: format cannot be applied to {kind} argument \"{name}\"")]
    FormatNotApplicable {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
        /// Source of the offending argument.
        kind: SourceKind,
        /// Argument name or type.
        name: String,
    },

    /// The same (owner, method) pair was registered twice.
    #[error("{owner}::{handler} is already registered")]
    DuplicateEndpoint {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
    },

    /// Two endpoints were bound to the same verb and path.
    #[error("route {method} {path} is already bound")]
    DuplicateRoute {
        /// Declared verb.
        method: HttpMethod,
        /// Declared path template.
        path: String,
    },

    /// The path template is malformed.
    #[error("invalid path template \"{path}\": {reason}")]
    InvalidPath {
        /// The offending template.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A route was declared without a handler function.
    #[error("{owner}::{handler}: endpoint declared without a handler")]
    MissingHandler {
        /// Owning controller type.
        owner: String,
        /// Method name.
        handler: String,
    },
}

/// An error raised after arguments were resolved.
///
/// Handler errors are never reported to the caller in detail. The server
/// logs them and answers with a generic `500`.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Application failure raised by the handler itself.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    /// A declared service could not be resolved.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// An argument accessor was used on a position holding another source.
    #[error("argument {index}: expected {expected}, found {found}")]
    ArgumentType {
        /// Position that was read.
        index: usize,
        /// What the accessor expected.
        expected: &'static str,
        /// What the position held.
        found: &'static str,
    },

    /// A body could not be converted into the requested type.
    #[error("argument {index}: body does not match the target type: {source}")]
    BodyConversion {
        /// Position that was read.
        index: usize,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The handler's return value could not be serialized.
    #[error("response serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl HandlerError {
    /// Creates an internal error from a message.
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{message}"))
    }
}
