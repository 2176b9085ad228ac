//! Application error types.

use thiserror::Error;
use trellis_config::ConfigError;
use trellis_core::DeclarationError;
use trellis_server::{LifecycleError, ServerError};
use trellis_telemetry::TelemetryError;

/// Errors raised while assembling or starting an application.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// An endpoint declaration is invalid.
    #[error("invalid endpoint declaration: {0}")]
    Declaration(#[from] DeclarationError),

    /// A background service failed to start.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The listener could not be bound.
    #[error("failed to start listening: {0}")]
    Bind(#[source] ServerError),

    /// The server stopped with an error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// The server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
