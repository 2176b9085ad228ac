//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the metrics recorder or exporter.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to build the log filter.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Unknown log output format.
    #[error("Unknown log format '{0}', expected 'json' or 'pretty'")]
    UnknownLogFormat(String),

    /// Failed to parse the exporter address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
