//! Prometheus metrics.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trellis_requests_total` | Counter | `method`, `route`, `status` | Requests handled by bound routes |
//! | `trellis_request_duration_seconds` | Histogram | `method`, `route` | Handler latency |
//! | `trellis_validation_failures_total` | Counter | `route`, `cause_kind` | Requests rejected with 400 |
//! | `trellis_in_flight_requests` | Gauge | - | Requests currently being dispatched |
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Requests handled by bound routes.
    pub const REQUESTS_TOTAL: &str = "trellis_requests_total";
    /// Handler latency histogram.
    pub const REQUEST_DURATION: &str = "trellis_request_duration_seconds";
    /// Requests rejected by argument validation.
    pub const VALIDATION_FAILURES_TOTAL: &str = "trellis_validation_failures_total";
    /// Requests currently being dispatched.
    pub const IN_FLIGHT: &str = "trellis_in_flight_requests";
}

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus exporter.
    pub enabled: bool,

    /// Address the exporter listens on (e.g. "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and spawns its HTTP listener.
///
/// Must be called from within a Tokio runtime when enabled. A second call
/// after a successful one is a no-op.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the exporter cannot be built or a
/// different recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Prometheus exporter stopped");
        }
    });

    describe_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Renders metrics in Prometheus text format, if the recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(names::REQUESTS_TOTAL, "Requests handled by bound routes");
    describe_histogram!(names::REQUEST_DURATION, "Handler latency in seconds");
    describe_counter!(
        names::VALIDATION_FAILURES_TOTAL,
        "Requests rejected by argument validation"
    );
    describe_gauge!(names::IN_FLIGHT, "Requests currently being dispatched");
}

/// Records a completed request on a bound route.
pub fn record_request(method: &str, route: &str, status: u16, duration: Duration) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a request rejected with a validation failure.
///
/// `cause_kind` is one of `required`, `format`, `body` or `malformed`.
pub fn record_validation_failure(route: &str, cause_kind: &str) {
    counter!(
        names::VALIDATION_FAILURES_TOTAL,
        "route" => route.to_string(),
        "cause_kind" => cause_kind.to_string()
    )
    .increment(1);
}

/// Counts a request as in flight until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(names::IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(names::IN_FLIGHT).decrement(1.0);
    }
}
