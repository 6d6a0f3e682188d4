//! Prometheus metrics for the upload-time server.
#![allow(clippy::cast_precision_loss)]
//!
//! Metrics are exposed at `GET /metrics` in Prometheus text format.
//!
//! # Metrics Exposed
//!
//! ## Request Metrics
//! - `upload_time_http_requests_total` - Total HTTP requests (labels: method, path, status)
//! - `upload_time_http_request_duration_seconds` - Request duration histogram
//! - `upload_time_auth_failures_total` - Rejected Basic auth attempts
//!
//! ## Timer Metrics
//! - `upload_time_timer_operations_total` - Timer operations (labels: operation, outcome)
//!
//! ## Janitor Metrics
//! - `upload_time_janitor_passes_total` - Janitor passes (labels: outcome)
//! - `upload_time_janitor_evicted_total` - Records evicted by the janitor
//! - `upload_time_janitor_pass_duration_seconds` - Janitor pass duration histogram

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder.
///
/// Safe to call more than once; later calls return the existing handle.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Internal(format!("failed to install Prometheus recorder: {e}")))?;

    register_metrics();

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Gets the global Prometheus handle.
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

fn register_metrics() {
    describe_counter!(
        "upload_time_http_requests_total",
        "Total number of HTTP requests"
    );
    describe_histogram!(
        "upload_time_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "upload_time_auth_failures_total",
        "Total rejected Basic auth attempts"
    );

    describe_counter!(
        "upload_time_timer_operations_total",
        "Total timer operations"
    );

    describe_counter!("upload_time_janitor_passes_total", "Total janitor passes");
    describe_counter!(
        "upload_time_janitor_evicted_total",
        "Total records evicted by the janitor"
    );
    describe_histogram!(
        "upload_time_janitor_pass_duration_seconds",
        "Janitor pass duration in seconds"
    );
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Records an HTTP request.
///
/// `route` should be the matched route template (e.g. `/timestamps/{name}`)
/// so timer names never become label values.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    counter!(
        "upload_time_http_requests_total",
        "method" => method.to_string(),
        "path" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "upload_time_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => route.to_string()
    )
    .record(duration_secs);
}

/// Records a rejected Basic auth attempt.
pub fn record_auth_failure() {
    counter!("upload_time_auth_failures_total").increment(1);
}

// =============================================================================
// Timer Metrics
// =============================================================================

/// Records a timer operation (`set`, `get`, `list`, `delete`).
pub fn record_timer_operation(operation: &'static str, success: bool) {
    counter!(
        "upload_time_timer_operations_total",
        "operation" => operation,
        "outcome" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

// =============================================================================
// Janitor Metrics
// =============================================================================

/// Records a janitor pass. `outcome` is `success`, `failure` or `skipped`.
pub fn record_janitor_pass(outcome: &'static str, evicted: usize, duration_secs: f64) {
    counter!("upload_time_janitor_passes_total", "outcome" => outcome).increment(1);

    if evicted > 0 {
        counter!("upload_time_janitor_evicted_total").increment(evicted as u64);
    }

    histogram!("upload_time_janitor_pass_duration_seconds").record(duration_secs);
}

// =============================================================================
// Metrics Rendering
// =============================================================================

/// Renders all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match get_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}
