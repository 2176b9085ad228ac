//! Typed configuration for Trellis applications.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing that fails on unknown fields
//!
//! # Example
//!
//! ```no_run
//! use trellis_config::ConfigLoader;
//!
//! # fn main() -> Result<(), trellis_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("trellis.toml")?
//!     .with_env_prefix("TRELLIS")
//!     .load()?;
//!
//! println!("Server will listen on: {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:3000"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//! max_body_bytes = 1048576
//! resolve_timeout_ms = 2000
//!
//! [lifecycle]
//! startup_timeout_ms = 10000
//!
//! [telemetry]
//! service_name = "profile-service"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `TRELLIS__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `TRELLIS__LIFECYCLE__STARTUP_TIMEOUT_MS=5000`
//! - `TRELLIS__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{AppConfig, AppConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LifecycleSection, LoggingSection, MetricsSection, ServerSection, TelemetrySection};
