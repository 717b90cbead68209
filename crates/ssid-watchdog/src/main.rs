use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use recovery::{RecoveryEngine, RunOutcome};
use ssid_watchdog::dbus::SystemBus;
use ssid_watchdog::shutdown;
use ssid_watchdog::telemetry::{self, EXIT_FATAL};
use ssid_watchdog::{bounded_network, Cli, WatchdogConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => {
            info!(?outcome, "Watchdog stopped");
            ExitCode::from(telemetry::exit_code(outcome))
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let interface = cli.interface();
    let config = WatchdogConfig::default();
    info!(
        monitor = ?config.engine.monitor_interval,
        call_timeout = ?config.call_timeout,
        unit = %config.manager_unit,
        "ssid-watchdog starting"
    );

    let bus = SystemBus::connect(config.manager_unit.clone()).await?;
    let network = bounded_network(Arc::new(bus), &config);

    let cancel = CancellationToken::new();
    shutdown::spawn_listener(cancel.clone()).context("Failed to install signal handlers")?;

    let mut engine = RecoveryEngine::new(network, interface.clone(), config.engine.clone(), cancel);
    let session = engine.session();
    let result = engine.run().await;

    // Idempotent; covers every exit path including errors.
    session.end().await;

    result.with_context(|| format!("Watchdog for {interface} failed"))
}
