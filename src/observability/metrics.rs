//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, relay mode
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_relay_bytes_total` (counter): body bytes relayed, by mode
//! - `proxy_upstream_errors_total` (counter): failed relays, by error kind
//! - `proxy_client_disconnects_total` (counter): callers gone before completion
//!
//! # Design Decisions
//! - Macros are no-ops until a recorder is installed
//! - The Prometheus listener only starts when an address is configured

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, mode: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "mode" => mode
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_relay_bytes(mode: &'static str, bytes: u64) {
    counter!("proxy_relay_bytes_total", "mode" => mode).increment(bytes);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_client_disconnect() {
    counter!("proxy_client_disconnects_total").increment(1);
}
