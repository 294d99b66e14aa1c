//! Invocation metrics for Hermes.
//!
//! Metrics go through the `metrics` facade. The library never installs an
//! exporter; the deployment chooses one (or none, in which case every call is
//! a no-op).
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hermes_invocations_total` | Counter | `outcome` | Completed invocations |
//! | `hermes_invocation_duration_seconds` | Histogram | `outcome` | Invocation latency |
//! | `hermes_phase_errors_total` | Counter | `phase` | Failed lifecycle phases |
//! | `hermes_error_hook_failures_total` | Counter | `plugin` | Swallowed error-hook failures |
//! | `hermes_in_flight_invocations` | Gauge | - | Invocations in progress |

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::Once;
use std::time::Duration;

/// Invocation counter.
pub const INVOCATIONS_TOTAL: &str = "hermes_invocations_total";
/// Invocation latency histogram.
pub const INVOCATION_DURATION_SECONDS: &str = "hermes_invocation_duration_seconds";
/// Failed phase counter.
pub const PHASE_ERRORS_TOTAL: &str = "hermes_phase_errors_total";
/// Error-hook failure counter.
pub const ERROR_HOOK_FAILURES_TOTAL: &str = "hermes_error_hook_failures_total";
/// In-flight gauge.
pub const IN_FLIGHT_INVOCATIONS: &str = "hermes_in_flight_invocations";

static DESCRIBED: Once = Once::new();

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Every phase succeeded.
    Success,
    /// At least one phase failed.
    Failure,
}

impl Outcome {
    /// Label value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Registers descriptions for all standard metrics.
///
/// Safe to call more than once; only the first call registers.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        describe_counter!(INVOCATIONS_TOTAL, "Total number of completed invocations");
        describe_histogram!(
            INVOCATION_DURATION_SECONDS,
            "Invocation duration in seconds"
        );
        describe_counter!(PHASE_ERRORS_TOTAL, "Failed lifecycle phases by phase");
        describe_counter!(
            ERROR_HOOK_FAILURES_TOTAL,
            "Error hook failures that were logged and discarded"
        );
        describe_gauge!(
            IN_FLIGHT_INVOCATIONS,
            "Number of invocations currently being processed"
        );
    });
}

/// Records a completed invocation.
pub fn record_invocation(outcome: Outcome, duration: Duration) {
    counter!(INVOCATIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(INVOCATION_DURATION_SECONDS, "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

/// Records a failed lifecycle phase.
pub fn record_phase_error(phase: &'static str) {
    counter!(PHASE_ERRORS_TOTAL, "phase" => phase).increment(1);
}

/// Records an error-hook failure.
pub fn record_error_hook_failure(plugin: &'static str) {
    counter!(ERROR_HOOK_FAILURES_TOTAL, "plugin" => plugin).increment(1);
}

/// Guard that decrements in-flight invocations on drop.
///
/// Keeps the gauge right even when the invocation future is dropped early.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_INVOCATIONS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_INVOCATIONS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Failure.as_str(), "failure");
    }

    #[test]
    fn test_record_functions_without_recorder() {
        describe_metrics();
        describe_metrics();
        record_invocation(Outcome::Success, Duration::from_millis(10));
        record_phase_error("begin");
        record_error_hook_failure("tracer");
    }

    #[test]
    fn test_in_flight_guard() {
        let guard = InFlightGuard::new();
        drop(guard);
    }
}
