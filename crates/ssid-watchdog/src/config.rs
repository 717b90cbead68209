use std::time::Duration;

use recovery::EngineConfig;
use tracing::warn;

/// Prefix for all environment overrides.
pub const ENV_PREFIX: &str = "SSID_WATCHDOG_";

/// Top-level watchdog configuration.
///
/// Every field has a default; `SSID_WATCHDOG_*` environment variables
/// override them. Nothing is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Pauses between probes and remediation steps.
    pub engine: EngineConfig,
    /// Upper bound on any single bus call.
    pub call_timeout: Duration,
    /// systemd unit restarted by the last remediation stage.
    pub manager_unit: String,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl WatchdogConfig {
    /// Build from an arbitrary key lookup (the process environment in
    /// production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let secs = |name: &str, default: Duration| -> Duration {
            let key = format!("{ENV_PREFIX}{name}");
            match lookup(&key) {
                None => default,
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) => {
                        warn!(%key, "Ignoring zero-second override, using default");
                        default
                    }
                    Ok(v) => Duration::from_secs(v),
                    Err(_) => {
                        warn!(%key, value = %raw, "Ignoring non-numeric override, using default");
                        default
                    }
                },
            }
        };

        Self {
            engine: EngineConfig {
                monitor_interval: secs("MONITOR_SECS", defaults.monitor_interval),
                rescan_settle: secs("RESCAN_SETTLE_SECS", defaults.rescan_settle),
                toggle_pause: secs("TOGGLE_PAUSE_SECS", defaults.toggle_pause),
                toggle_settle: secs("TOGGLE_SETTLE_SECS", defaults.toggle_settle),
                restart_settle: secs("RESTART_SETTLE_SECS", defaults.restart_settle),
            },
            call_timeout: secs("CALL_TIMEOUT_SECS", Duration::from_secs(25)),
            manager_unit: lookup(&format!("{ENV_PREFIX}MANAGER_UNIT"))
                .unwrap_or_else(|| "NetworkManager.service".into()),
        }
    }
}
