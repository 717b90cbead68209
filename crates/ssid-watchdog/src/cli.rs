use clap::Parser;
use tracing::info;

pub const DEFAULT_INTERFACE: &str = "wlan0";

/// Watch a wireless interface and escalate recovery when access points vanish.
#[derive(Parser, Debug)]
#[command(name = "ssid-watchdog", version, about)]
pub struct Cli {
    /// Wireless interface to watch
    pub interface: Option<String>,
}

impl Cli {
    /// The interface to watch, falling back to `wlan0`.
    pub fn interface(&self) -> String {
        match &self.interface {
            Some(interface) => interface.clone(),
            None => {
                info!(
                    "No interface specified as first argument, defaulting to {}",
                    DEFAULT_INTERFACE
                );
                DEFAULT_INTERFACE.to_string()
            }
        }
    }
}
