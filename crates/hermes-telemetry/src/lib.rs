//! Observability for Hermes.
//!
//! - **Logging**: structured `tracing` output, JSON or pretty
//! - **Metrics**: invocation counters and latency via the `metrics` facade
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
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::{init_telemetry, LogConfig};
//!
//! init_telemetry(&LogConfig::production())?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{describe_metrics, InFlightGuard, Outcome};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs the logging subscriber and registers metric descriptions.
///
/// Call once at cold start, before the first invocation.
pub fn init_telemetry(config: &LogConfig) -> TelemetryResult<()> {
    init_logging(config)?;
    describe_metrics();
    Ok(())
}
