//! ssid-watchdog runtime: CLI, configuration, logging and the system-bus
//! backend that plugs into the `recovery` engine.

pub mod cli;
pub mod config;
pub mod dbus;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;

use recovery::{NetworkControl, TimedNetwork};

pub use cli::Cli;
pub use config::WatchdogConfig;

/// Wrap a backend so every call respects the configured timeout.
pub fn bounded_network(
    backend: Arc<dyn NetworkControl>,
    config: &WatchdogConfig,
) -> Arc<dyn NetworkControl> {
    Arc::new(TimedNetwork::new(backend, config.call_timeout))
}
