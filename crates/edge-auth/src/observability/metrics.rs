//! Metrics definitions for the edge gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `edge_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: `accepted` or one of the eight rejection reason codes
//! - `status`: `success` or `failure`
//! - `trigger`: `populate` or `refresh`

use crate::errors::RejectReason;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Outcome label for accepted requests.
pub const OUTCOME_ACCEPTED: &str = "accepted";

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// Must be called before any metrics are recorded. Verification buckets sit
/// in the sub-millisecond range since the common path does no I/O.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("edge_auth_verification".to_string()),
            &[
                0.000_1, 0.000_25, 0.000_5, 0.001, 0.002_5, 0.005, 0.010, 0.025, 0.050, 0.100,
                0.500,
            ],
        )
        .map_err(|e| format!("Failed to set verification buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("edge_auth_key_set_population".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set key set population buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record the verdict for one request.
///
/// Metric: `edge_auth_verdicts_total`, `edge_auth_verification_duration_seconds`
/// Labels: `outcome`
pub fn record_verdict(outcome: Result<(), RejectReason>, duration: Duration) {
    let outcome = match outcome {
        Ok(()) => OUTCOME_ACCEPTED,
        Err(reason) => reason.code(),
    };

    histogram!("edge_auth_verification_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
    counter!("edge_auth_verdicts_total", "outcome" => outcome).increment(1);
}

/// Record a key set population or refresh attempt.
///
/// Metric: `edge_auth_key_set_populations_total`,
/// `edge_auth_key_set_population_duration_seconds`
/// Labels: `trigger`, `status`
pub fn record_key_set_population(trigger: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };

    histogram!("edge_auth_key_set_population_duration_seconds",
        "trigger" => trigger,
        "status" => status
    )
    .record(duration.as_secs_f64());
    counter!("edge_auth_key_set_populations_total",
        "trigger" => trigger,
        "status" => status
    )
    .increment(1);
}

/// Set the number of trusted keys currently loaded.
///
/// Metric: `edge_auth_key_set_keys`
#[allow(clippy::cast_precision_loss)]
pub fn set_key_set_keys(count: usize) {
    gauge!("edge_auth_key_set_keys").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        name: &str,
        label: (&str, &str),
    ) -> Option<u64> {
        snapshot.iter().find_map(|(key, _, _, value)| {
            let key = key.key();
            let matches = key.name() == name
                && key
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
            match (matches, value) {
                (true, DebugValue::Counter(count)) => Some(*count),
                _ => None,
            }
        })
    }

    #[test]
    fn test_record_verdict_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_verdict(Ok(()), Duration::from_micros(150));
            record_verdict(Ok(()), Duration::from_micros(90));
            record_verdict(Err(RejectReason::UnknownKey), Duration::from_micros(40));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "edge_auth_verdicts_total", ("outcome", "accepted")),
            Some(2)
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "edge_auth_verdicts_total",
                ("outcome", "unknown_key")
            ),
            Some(1)
        );
    }

    #[test]
    fn test_record_key_set_population() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_key_set_population("populate", true, Duration::from_millis(120));
            record_key_set_population("refresh", false, Duration::from_millis(5));
            set_key_set_keys(3);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(
                &snapshot,
                "edge_auth_key_set_populations_total",
                ("status", "failure")
            ),
            Some(1)
        );
        let gauge = snapshot.iter().find_map(|(key, _, _, value)| {
            match (key.key().name() == "edge_auth_key_set_keys", value) {
                (true, DebugValue::Gauge(v)) => Some(v.into_inner()),
                _ => None,
            }
        });
        assert_eq!(gauge, Some(3.0));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_verdict(Err(RejectReason::NoCredential), Duration::from_millis(1));
        record_key_set_population("refresh", true, Duration::from_millis(1));
        set_key_set_keys(0);
    }
}
