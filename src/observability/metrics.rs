//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define routing metrics (recognitions, latency, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `railyard_recognitions_total` (counter): requests by outcome
//! - `railyard_recognition_duration_seconds` (histogram): time spent recognizing
//! - `railyard_route_reloads_total` (counter): reload attempts by result
//! - `railyard_routes` (gauge): routes in the live table
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Outcome labels are a closed set of static strings

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::routing::error::RoutingError;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Label for a recognition result.
pub fn outcome_label<T>(result: &Result<T, RoutingError>) -> &'static str {
    match result {
        Ok(_) => "matched",
        Err(RoutingError::MethodNotAllowed { .. }) => "method_not_allowed",
        Err(RoutingError::NotImplemented { .. }) => "not_implemented",
        Err(_) => "no_route",
    }
}

pub fn record_recognition(outcome: &'static str, started: Instant) {
    metrics::counter!("railyard_recognitions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("railyard_recognition_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

/// `result` is one of `applied`, `invalid`, `failed`.
pub fn record_reload(result: &'static str) {
    metrics::counter!("railyard_route_reloads_total", "result" => result).increment(1);
}

pub fn record_route_count(count: usize) {
    metrics::gauge!("railyard_routes").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label::<()>(&Ok(())), "matched");
        let err: Result<(), _> = Err(RoutingError::NoRoute {
            path: "/x".into(),
            method: None,
        });
        assert_eq!(outcome_label(&err), "no_route");
        let err: Result<(), _> = Err(RoutingError::NotImplemented {
            method: "PROPFIND".into(),
            allowed: vec![],
        });
        assert_eq!(outcome_label(&err), "not_implemented");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_recognition("matched", Instant::now());
        record_reload("applied");
        record_route_count(3);
    }
}
