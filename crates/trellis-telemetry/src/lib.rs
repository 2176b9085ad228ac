//! Logging and metrics for Trellis services.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter` and JSON or pretty output
//! - **Metrics**: `metrics` counters exported in Prometheus format
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::builder()
//!         .service_name("profile-service")
//!         .metrics_addr("0.0.0.0:9090")
//!         .build();
//!
//!     init_telemetry(&config).unwrap();
//! }
//! ```
//!
//! # Metrics Endpoint
//!
//! ```text
//! # TYPE trellis_requests_total counter
//! trellis_requests_total{method="GET",route="/:age",status="200"} 12
//! trellis_requests_total{method="GET",route="/:age",status="400"} 3
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use self::metrics::{init_metrics, record_request, record_validation_failure, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::debug!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}
