//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relayed requests by outcome
//! - `relay_request_duration_seconds` (histogram): registration to resolution
//! - `relay_pending_requests` (gauge): correlation table occupancy
//! - `relay_executor_connected` (gauge): 1=connected, 0=disconnected
//! - `relay_executor_connections_total` (counter): accepted executor connections
//! - `relay_probes_total` (counter): liveness probes by result
//! - `relay_malformed_frames_total` (counter): dropped executor frames
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op, so tests and
//!   library users pay nothing

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a relayed request that reached a resolver.
pub fn record_relay_outcome(outcome: &'static str, started: Instant) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Record a request rejected before registration.
pub fn record_rejected(outcome: &'static str) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_pending(count: usize) {
    gauge!("relay_pending_requests").set(count as f64);
}

pub fn record_executor_connected(connected: bool) {
    if connected {
        counter!("relay_executor_connections_total").increment(1);
    }
    gauge!("relay_executor_connected").set(if connected { 1.0 } else { 0.0 });
}

pub fn record_probe(result: &'static str) {
    counter!("relay_probes_total", "result" => result).increment(1);
}

pub fn record_malformed_frame() {
    counter!("relay_malformed_frames_total").increment(1);
}
