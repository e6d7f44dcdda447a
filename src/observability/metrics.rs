//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_admission_rejected_total` (counter): refused upgrades by reason
//! - `gateway_dial_total` (counter): target dials by outcome
//! - `gateway_relay_bytes_total` (counter): relayed bytes by direction
//! - `gateway_sessions_active` (gauge): sessions currently running
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission_rejected(reason: &'static str) {
    counter!("gateway_admission_rejected_total", "reason" => reason).increment(1);
}

pub fn record_dial(outcome: &'static str) {
    counter!("gateway_dial_total", "outcome" => outcome).increment(1);
}

pub fn record_relay_bytes(direction: &'static str, bytes: u64) {
    counter!("gateway_relay_bytes_total", "direction" => direction).increment(bytes);
}

pub fn set_active_sessions(count: u64) {
    gauge!("gateway_sessions_active").set(count as f64);
}
