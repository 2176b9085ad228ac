//! Configuration schema types.
//!
//! Every section rejects unknown fields and fills missing ones with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use trellis_server::ServerConfig;
use trellis_telemetry::{LogFormat, LoggingConfig, MetricsConfig, TelemetryConfig};

/// HTTP server section.
///
/// # Example
///
/// ```
/// use trellis_config::ServerSection;
///
/// let section = ServerSection {
///     http_addr: "127.0.0.1:8080".to_string(),
///     resolve_timeout_ms: Some(500),
///     ..Default::default()
/// };
/// let config = section.to_server_config();
/// assert_eq!(config.http_addr(), "127.0.0.1:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address. The port is replaced by the one passed to `start`.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Time allowed to receive a request body, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Deadline for resolving a request's arguments, in milliseconds.
    #[serde(default)]
    pub resolve_timeout_ms: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            resolve_timeout_ms: None,
        }
    }
}

impl ServerSection {
    /// Converts the section into the server's runtime configuration.
    #[must_use]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .max_body_size(self.max_body_bytes)
            .resolve_timeout(self.resolve_timeout_ms.map(Duration::from_millis))
            .build()
    }
}

fn default_http_addr() -> String {
    trellis_server::config::DEFAULT_HTTP_ADDR.to_string()
}

fn default_shutdown_timeout() -> u64 {
    trellis_server::config::DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    trellis_server::config::DEFAULT_REQUEST_TIMEOUT_SECS * 1000
}

fn default_max_body_bytes() -> usize {
    trellis_server::config::DEFAULT_MAX_BODY_SIZE
}

/// Background service section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LifecycleSection {
    /// Deadline for each start hook, in milliseconds. Unset waits forever.
    #[serde(default)]
    pub startup_timeout_ms: Option<u64>,
}

impl LifecycleSection {
    /// Returns the start hook deadline.
    #[must_use]
    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout_ms.map(Duration::from_millis)
    }
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name attached to logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl TelemetrySection {
    /// Converts the section into the telemetry crate's configuration.
    #[must_use]
    pub fn to_telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            logging: LoggingConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                format: self.logging.format,
                ..LoggingConfig::default()
            },
            metrics: MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
            },
        }
    }
}

fn default_service_name() -> String {
    "trellis-service".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether logging is installed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fallback filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Whether the Prometheus exporter is installed.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}
