//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lra_tck_started_total` (counter): LRAs started, by `nested`
//! - `lra_tck_ended_total` (counter): LRAs ended, by `outcome` (closed, cancelled, timed_out)
//! - `lra_tck_leaked_total` (counter): LRAs still open at test teardown
//! - `lra_tck_pending_timers` (gauge): cancellation timers not yet fired

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_lra_started(nested: bool) {
    let nested = if nested { "true" } else { "false" };
    counter!("lra_tck_started_total", "nested" => nested).increment(1);
}

pub fn record_lra_ended(outcome: &'static str) {
    counter!("lra_tck_ended_total", "outcome" => outcome).increment(1);
}

pub fn record_lra_leaked() {
    counter!("lra_tck_leaked_total").increment(1);
}

pub fn set_pending_timers(count: usize) {
    gauge!("lra_tck_pending_timers").set(count as f64);
}
