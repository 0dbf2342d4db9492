//! Metrics collection and exposition.
//!
//! # Metrics
//! - `flood_guard_decisions_total` (counter): admissions and denials by guard and reason
//! - `flood_guard_tracked_sources` (gauge): per-guard record table size
//! - `flood_guard_blacklisted_sources` (gauge): current blacklist size
//! - `flood_guard_tracked_user_agents` (gauge): global user-agent table size
//! - `flood_guard_sweep_evictions_total` (counter): entries removed by sweeps
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(guard: &'static str, admitted: bool, reason: &'static str) {
    let outcome = if admitted { "admit" } else { "deny" };
    counter!(
        "flood_guard_decisions_total",
        "guard" => guard,
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_tracked_sources(guard: &'static str, count: usize) {
    gauge!("flood_guard_tracked_sources", "guard" => guard).set(count as f64);
}

pub fn record_blacklist_size(count: usize) {
    gauge!("flood_guard_blacklisted_sources").set(count as f64);
}

pub fn record_tracked_user_agents(count: usize) {
    gauge!("flood_guard_tracked_user_agents").set(count as f64);
}

pub fn record_evictions(guard: &'static str, table: &'static str, evicted: usize) {
    if evicted > 0 {
        counter!(
            "flood_guard_sweep_evictions_total",
            "guard" => guard,
            "table" => table
        )
        .increment(evicted as u64);
    }
}
