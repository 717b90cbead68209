//! Logging setup and process exit codes.

use recovery::RunOutcome;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,recovery=debug,ssid_watchdog=debug";

/// Exit status when the run could not start or lost its device.
pub const EXIT_FATAL: u8 = 1;
/// Exit status when every remediation stage failed.
pub const EXIT_EXHAUSTED: u8 = 2;

/// Install the global subscriber. Every line carries a timestamp.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with_target(false)
        .init();
}

/// Map a finished run onto the process exit status.
pub fn exit_code(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Interrupted => 0,
        RunOutcome::Exhausted => EXIT_EXHAUSTED,
    }
}
