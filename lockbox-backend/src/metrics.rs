//! Backend metrics for lockbox.
//!
//! Enable the `metrics` feature to record these metrics from
//! [`LoggingBackend`](crate::LoggingBackend).
//!
//! ## Naming Pattern
//!
//! All metrics follow the pattern: `lockbox_backend_{metric}`
//!
//! - `lockbox_backend_commands_total` - commands issued, by backend and command
//! - `lockbox_backend_command_errors_total` - failed commands, by backend and command
//! - `lockbox_backend_command_duration_seconds` - command latency histogram

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for total commands counter.
    pub static ref BACKEND_COMMANDS_TOTAL: &'static str = {
        metrics::describe_counter!(
            "lockbox_backend_commands_total",
            "Total number of commands issued per backend."
        );
        "lockbox_backend_commands_total"
    };

    /// Metric name for command errors counter.
    pub static ref BACKEND_COMMAND_ERRORS: &'static str = {
        metrics::describe_counter!(
            "lockbox_backend_command_errors_total",
            "Total number of failed commands per backend."
        );
        "lockbox_backend_command_errors_total"
    };

    /// Metric name for command duration histogram.
    pub static ref BACKEND_COMMAND_DURATION: &'static str = {
        metrics::describe_histogram!(
            "lockbox_backend_command_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of backend commands in seconds."
        );
        "lockbox_backend_command_duration_seconds"
    };
}

/// Records a completed command.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_command(backend: &str, command: &'static str, duration: Duration) {
    metrics::counter!(
        *BACKEND_COMMANDS_TOTAL,
        "backend" => backend.to_string(),
        "command" => command
    )
    .increment(1);
    metrics::histogram!(
        *BACKEND_COMMAND_DURATION,
        "backend" => backend.to_string(),
        "command" => command
    )
    .record(duration.as_secs_f64());
}

/// Records a completed command.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_command(_backend: &str, _command: &'static str, _duration: Duration) {}

/// Records a failed command.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_command_error(backend: &str, command: &'static str) {
    metrics::counter!(
        *BACKEND_COMMAND_ERRORS,
        "backend" => backend.to_string(),
        "command" => command
    )
    .increment(1);
}

/// Records a failed command.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_command_error(_backend: &str, _command: &'static str) {}
