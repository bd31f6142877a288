//! Prometheus metrics for bandwidth enforcement.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `bandwidth_throttled_responses_total` - Responses paced at a limit (label: endpoint)
//! - `bandwidth_rejected_responses_total` - Responses replaced by a 429 (label: endpoint)
//! - `bandwidth_passthrough_responses_total` - Responses on endpoints without a limit
//! - `bandwidth_limit_updates_total` - Runtime limit changes (label: action)
//!
//! ## Histograms
//! - `bandwidth_buffered_delay_seconds` - Time a buffered body was held before release (label: endpoint)
//!
//! # Usage
//!
//! ```rust,ignore
//! use response_throttle::metrics::{init_metrics, record_throttled};
//!
//! init_metrics("0.0.0.0:9090".parse()?)?;
//! record_throttled("get_data");
//! ```
//!
//! Recording without an installed exporter is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const THROTTLED_RESPONSES_TOTAL: &str = "bandwidth_throttled_responses_total";
    pub const REJECTED_RESPONSES_TOTAL: &str = "bandwidth_rejected_responses_total";
    pub const PASSTHROUGH_RESPONSES_TOTAL: &str = "bandwidth_passthrough_responses_total";
    pub const LIMIT_UPDATES_TOTAL: &str = "bandwidth_limit_updates_total";
    pub const BUFFERED_DELAY_SECONDS: &str = "bandwidth_buffered_delay_seconds";
}

/// Initialize the Prometheus metrics exporter on `metrics_addr`.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::THROTTLED_RESPONSES_TOTAL,
        "Total number of response bodies paced at a bandwidth limit"
    );
    describe_counter!(
        names::REJECTED_RESPONSES_TOTAL,
        "Total number of responses rejected for exceeding a bandwidth limit"
    );
    describe_counter!(
        names::PASSTHROUGH_RESPONSES_TOTAL,
        "Total number of responses on endpoints without a bandwidth limit"
    );
    describe_counter!(
        names::LIMIT_UPDATES_TOTAL,
        "Total number of bandwidth limit changes made at runtime"
    );
    describe_histogram!(
        names::BUFFERED_DELAY_SECONDS,
        "Seconds a buffered response body was held before release"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

pub fn record_throttled(endpoint: &str) {
    counter!(names::THROTTLED_RESPONSES_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_rejected(endpoint: &str) {
    counter!(names::REJECTED_RESPONSES_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_passthrough() {
    counter!(names::PASSTHROUGH_RESPONSES_TOTAL).increment(1);
}

/// Record a runtime limit change. `action` is `"set"` or `"remove"`.
pub fn record_limit_update(action: &'static str) {
    counter!(names::LIMIT_UPDATES_TOTAL, "action" => action).increment(1);
}

// =============================================================================
// Histogram Recording Functions
// =============================================================================

pub fn record_buffered_delay(endpoint: &str, duration_secs: f64) {
    histogram!(names::BUFFERED_DELAY_SECONDS, "endpoint" => endpoint.to_string())
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording must not panic without an installed exporter.

    #[test]
    fn test_record_counters() {
        record_throttled("get_data");
        record_rejected("get_data");
        record_passthrough();
        record_limit_update("set");
    }

    #[test]
    fn test_record_buffered_delay() {
        record_buffered_delay("slow", 2.5);
    }
}
