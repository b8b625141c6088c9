//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shim_http_requests_total` (counter): HTTP bridge requests by method, status
//! - `shim_http_request_duration_seconds` (histogram): upstream round-trip latency
//! - `shim_ws_sessions_active` (gauge): local WebSocket connections being bridged
//! - `shim_ws_upstream_connects_total` (counter): upstream connects by outcome
//! - `shim_ws_reconnects_total` (counter): backoff waits entered
//! - `shim_ws_frames_total` (counter): relayed frames by direction
//!
//! Updates are no-ops until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "shim_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("shim_http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn ws_session_opened() {
    metrics::gauge!("shim_ws_sessions_active").increment(1.0);
}

pub fn ws_session_closed() {
    metrics::gauge!("shim_ws_sessions_active").decrement(1.0);
}

pub fn record_upstream_connect(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("shim_ws_upstream_connects_total", "outcome" => outcome).increment(1);
}

pub fn record_reconnect() {
    metrics::counter!("shim_ws_reconnects_total").increment(1);
}

pub fn record_frame(direction: &'static str) {
    metrics::counter!("shim_ws_frames_total", "direction" => direction).increment(1);
}
