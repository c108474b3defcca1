//! Metrics collection and exposition.
//!
//! # Metrics
//! - `social_requests_total` (counter): requests by method, status
//! - `social_request_duration_seconds` (histogram): latency distribution
//! - `social_rate_limited_total` (counter): requests rejected by the limiter
//! - `social_identity_cache_total` (counter): identity cache hits and misses
//! - `social_auth_failures_total` (counter): authentication failures by kind
//! - `social_authz_decisions_total` (counter): allowed, denied and errored checks
//! - `social_rate_limit_keys` (gauge): client keys tracked by the limiter
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of setup
//! - Label values are static strings wherever possible

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "social_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("social_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("social_rate_limited_total").increment(1);
}

pub fn record_rate_limit_keys(keys: usize) {
    metrics::gauge!("social_rate_limit_keys").set(keys as f64);
}

/// `outcome` is `hit` or `miss`.
pub fn record_cache_lookup(outcome: &'static str) {
    metrics::counter!("social_identity_cache_total", "outcome" => outcome).increment(1);
}

pub fn record_auth_failure(kind: &'static str) {
    metrics::counter!("social_auth_failures_total", "kind" => kind).increment(1);
}

/// `outcome` is `allowed`, `denied` or `error`.
pub fn record_authz_decision(outcome: &'static str) {
    metrics::counter!("social_authz_decisions_total", "outcome" => outcome).increment(1);
}
