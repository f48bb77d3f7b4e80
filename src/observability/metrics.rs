//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fetch_requests_total` (counter): fetch attempts by outcome
//!   (success, failure, cancelled, cache_hit, skipped_open)
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `result_cache_size` (gauge): cached entries
//!
//! # Design Decisions
//! - Metric updates are cheap atomic operations via the `metrics` facade
//! - Exposition is Prometheus scrape on a dedicated listener

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter on `addr`.
///
/// Failure to install is logged, not fatal: the service keeps running
/// without exposition.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one fetch attempt by outcome.
pub fn record_fetch_outcome(outcome: &'static str) {
    metrics::counter!("fetch_requests_total", "outcome" => outcome).increment(1);
}

/// Publish the breaker state gauge.
pub fn record_breaker_state(state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    metrics::gauge!("circuit_breaker_state").set(value);
}

/// Publish the current cache entry count.
pub fn record_cache_size(size: usize) {
    metrics::gauge!("result_cache_size").set(size as f64);
}
