//! Top-level configuration type.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{ConfigError, LifecycleSection, ServerSection, TelemetrySection};

/// Complete Trellis application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use trellis_config::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:3000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Background service settings.
    #[serde(default)]
    pub lifecycle: LifecycleSection,

    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl AppConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the server address is empty or not a socket address
    /// - a timeout is zero
    /// - metrics are enabled with an invalid address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.http_addr.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.http_addr", "must not be empty"));
        }
        if server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", server.http_addr),
            ));
        }

        let timeouts = [
            ("server.shutdown_timeout_secs", Some(server.shutdown_timeout_secs)),
            ("server.request_timeout_ms", Some(server.request_timeout_ms)),
            ("server.resolve_timeout_ms", server.resolve_timeout_ms),
            ("lifecycle.startup_timeout_ms", self.lifecycle.startup_timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == Some(0) {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        if server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        let metrics = &self.telemetry.metrics;
        if metrics.enabled && metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", metrics.addr),
            ));
        }

        Ok(())
    }

    /// Local development preset: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = trellis_telemetry::LogFormat::Pretty;
        config
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.config.server = server;
        self
    }

    /// Set the lifecycle section.
    #[must_use]
    pub fn lifecycle(mut self, lifecycle: LifecycleSection) -> Self {
        self.config.lifecycle = lifecycle;
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_address_rejected() {
        let config = AppConfig::builder()
            .server(ServerSection {
                http_addr: "  ".into(),
                ..Default::default()
            })
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "server.http_addr"
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AppConfig::builder()
            .lifecycle(LifecycleSection {
                startup_timeout_ms: Some(0),
            })
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "lifecycle.startup_timeout_ms"
        ));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.telemetry.metrics.addr = "nowhere".into();
        assert!(config.validate().is_ok());

        config.telemetry.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_development_preset() {
        let config = AppConfig::development();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(
            config.telemetry.logging.format,
            trellis_telemetry::LogFormat::Pretty
        );
    }
}
