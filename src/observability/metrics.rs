//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): limited requests by route
//! - `gateway_blocked_clients_total` (counter): clients escalated to the block list
//! - `gateway_security_events_total` (counter): security events by kind
//! - `gateway_upstream_requests_total` (counter): provider calls by outcome
//!
//! Recording is a no-op until a recorder is installed, so the functions are
//! safe to call from tests.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_client_blocked() {
    counter!("gateway_blocked_clients_total").increment(1);
}

pub fn record_security_event(kind: &'static str) {
    counter!("gateway_security_events_total", "kind" => kind).increment(1);
}

pub fn record_upstream(provider: &'static str, outcome: &'static str) {
    counter!(
        "gateway_upstream_requests_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
}
