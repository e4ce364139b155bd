//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): limiter denials and failures by reason
//! - `gateway_auth_failures_total` (counter): rejected credentials by reason
//! - `gateway_jwks_fetches_total` (counter): key-set fetches by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
///
/// # Errors
///
/// Fails if the listener cannot be started or a recorder is already installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("gateway_requests_total", "Total requests handled by the gateway");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Request latency in seconds"
    );
    describe_counter!("gateway_rate_limited_total", "Rate limiter denials and failures");
    describe_counter!("gateway_auth_failures_total", "Rejected credentials");
    describe_counter!("gateway_jwks_fetches_total", "JWKS fetches by outcome");
}

/// Record a completed request.
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

pub fn record_rate_limited(reason: &'static str) {
    counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_jwks_fetch(outcome: &'static str) {
    counter!("gateway_jwks_fetches_total", "outcome" => outcome).increment(1);
}
