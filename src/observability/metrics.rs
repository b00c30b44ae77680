//! Metrics collection and exposition.
//!
//! # Metrics
//! - `certgate_transitions_total` (counter): order transitions by action, outcome
//! - `certgate_rate_limited_total` (counter): quota denials by operation
//! - `certgate_anchor_attempts_total` (counter): anchor submissions by outcome
//! - `certgate_verifications_total` (counter): public lookups by kind, outcome

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on its own listener.
pub fn install_exporter(address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| format!("failed to install metrics exporter: {e}"))
}

pub fn record_transition(action: &'static str, outcome: &'static str) {
    counter!("certgate_transitions_total", "action" => action, "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(operation: String) {
    counter!("certgate_rate_limited_total", "operation" => operation).increment(1);
}

pub fn record_anchor_attempt(outcome: &'static str) {
    counter!("certgate_anchor_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_verification(kind: &'static str, outcome: &'static str) {
    counter!("certgate_verifications_total", "kind" => kind, "outcome" => outcome).increment(1);
}
