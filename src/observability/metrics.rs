//! Metrics collection and exposition.
//!
//! # Metrics
//! - `streaming_proxy_streams_total` (counter): rendezvous listeners opened, by kind
//! - `streaming_proxy_active_streams` (gauge): streams holding a scope
//! - `streaming_proxy_bytes_read_total` (counter): bytes read from workloads
//! - `streaming_proxy_bytes_relayed_total` (counter): bytes written to clients
//! - `streaming_proxy_invocations_total` (counter): by kind and outcome
//!
//! Recording is a no-op until an exporter is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Expose a Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_stream_opened(kind: &'static str) {
    counter!("streaming_proxy_streams_total", "kind" => kind).increment(1);
}

pub fn set_active_streams(count: u64) {
    gauge!("streaming_proxy_active_streams").set(count as f64);
}

pub fn record_bytes_read(bytes: usize) {
    counter!("streaming_proxy_bytes_read_total").increment(bytes as u64);
}

pub fn record_bytes_relayed(bytes: usize) {
    counter!("streaming_proxy_bytes_relayed_total").increment(bytes as u64);
}

pub fn record_invocation(kind: &'static str, outcome: &'static str) {
    counter!("streaming_proxy_invocations_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}
