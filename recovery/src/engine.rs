//! Recovery Escalation Engine: the monitoring loop.
//!
//! Consumes probe observations and drives the stage machine. Each remediation
//! is strictly more disruptive than the one before it, so the engine always
//! tries the cheapest first and escalates only on a confirmed zero count.
//!
//! ```text
//! wait(monitor) → probe ── count > 0 ──────────────────────────┐
//!                   │ 0                                         │
//!                   ▼                                           │
//!   Rescan:        scan, wait, probe ── count > 0 → reset ──────┤
//!                   │ 0                                         │
//!   ToggleManaged: unmanage, wait, manage, wait, probe ── > 0 ──┤
//!                   │ 0                                         │
//!   RestartService: restart unit, wait, probe ── > 0 ───────────┤
//!                   │ 0                                         │
//!   Terminal:      end session, RunOutcome::Exhausted           │
//!                                                    loop  ◄────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::WatchdogResult;
use crate::network::{DeviceHandle, NetworkControl};
use crate::probe::StateProbe;
use crate::session::DiagnosticSession;
use crate::stage::{RecoveryStage, StageMachine};
use crate::waiter::Waiter;

/// Fixed pauses between probes and remediation sub-steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Steady-state pause before each monitoring probe.
    pub monitor_interval: Duration,
    /// Pause after a scan request before re-probing.
    pub rescan_settle: Duration,
    /// Pause between marking the interface unmanaged and managed again.
    pub toggle_pause: Duration,
    /// Pause after re-managing the interface before re-probing.
    pub toggle_settle: Duration,
    /// Pause after a service restart before re-probing.
    pub restart_settle: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(10),
            rescan_settle: Duration::from_secs(10),
            toggle_pause: Duration::from_secs(5),
            toggle_settle: Duration::from_secs(10),
            restart_settle: Duration::from_secs(10),
        }
    }
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Stopped by an external interrupt.
    Interrupted,
    /// Every remediation stage ran without restoring visibility.
    Exhausted,
}

pub struct RecoveryEngine {
    network: Arc<dyn NetworkControl>,
    probe: StateProbe,
    session: Arc<DiagnosticSession>,
    waiter: Waiter,
    stages: StageMachine,
    config: EngineConfig,
}

impl RecoveryEngine {
    pub fn new(
        network: Arc<dyn NetworkControl>,
        interface: impl Into<String>,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        let session = Arc::new(DiagnosticSession::new(network.clone()));
        Self {
            probe: StateProbe::new(network.clone(), interface),
            waiter: Waiter::new(cancel, session.clone()),
            network,
            session,
            stages: StageMachine::new(),
            config,
        }
    }

    /// Shared handle to the diagnostic session, for teardown outside the loop.
    pub fn session(&self) -> Arc<DiagnosticSession> {
        self.session.clone()
    }

    pub fn stages(&self) -> &StageMachine {
        &self.stages
    }

    /// Run until interrupted or until every remediation stage has failed.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the interface cannot be resolved at startup
    /// (before any wait, probe or logging change), or if the service later
    /// reports it has no such device (after the session has been torn
    /// down). Transient lookup failures mid-run only read as zero access
    /// points.
    pub async fn run(&mut self) -> WatchdogResult<RunOutcome> {
        let device = self.probe.resolve().await?;
        info!(interface = %self.probe.interface(), device = %device, "Target interface");
        self.probe.describe(&device).await;

        self.session.begin().await;

        let result = match self.monitor().await {
            Err(e) if e.is_interrupt() => Ok(RunOutcome::Interrupted),
            other => other,
        };

        if result.is_err() {
            self.session.end().await;
        }
        self.log_summary();
        result
    }

    async fn monitor(&mut self) -> WatchdogResult<RunOutcome> {
        loop {
            self.waiter.wait(self.config.monitor_interval).await?;

            let observation = self.probe.observe().await?;
            if observation.has_access_points() {
                self.stages.reset("access points visible")?;
                continue;
            }

            warn!("No access points available");

            if self.escalate().await? {
                continue;
            }

            self.stages
                .advance(RecoveryStage::Terminal, Some("all remediation stages failed"))?;
            error!(
                cycle = self.stages.cycles(),
                "Access points not recovered after all remediation stages, giving up"
            );
            self.session.end().await;
            return Ok(RunOutcome::Exhausted);
        }
    }

    /// Walk the remediation stages in order. Returns `true` as soon as a
    /// re-probe sees access points again.
    async fn escalate(&mut self) -> WatchdogResult<bool> {
        for stage in RecoveryStage::REMEDIATIONS {
            self.stages
                .advance(stage, Some("no access points visible"))?;
            info!(stage = %stage, cycle = self.stages.cycles(), "Escalating");

            self.remediate(stage).await?;

            let observation = self.probe.observe().await?;
            if observation.has_access_points() {
                info!(stage = %stage, "{} WORKED!!!", stage.action_label());
                self.stages.reset("access points visible after remediation")?;
                return Ok(true);
            }

            warn!(stage = %stage, "{} did NOT work", stage.action_label());
        }
        Ok(false)
    }

    /// Perform one stage's action and its settle waits. Collaborator
    /// failures are logged and the stage carries on to its re-probe.
    async fn remediate(&self, stage: RecoveryStage) -> WatchdogResult<()> {
        match stage {
            RecoveryStage::Rescan => {
                self.probe.rescan().await?;
                self.waiter.wait(self.config.rescan_settle).await
            }
            RecoveryStage::ToggleManaged => {
                let Some(device) = self.probe.locate().await? else {
                    warn!("Managed toggle skipped, device lookup failed");
                    self.waiter.wait(self.config.toggle_pause).await?;
                    return self.waiter.wait(self.config.toggle_settle).await;
                };
                self.set_managed(&device, false).await;
                // Never leave the interface unmanaged, even when interrupted.
                let paused = self.waiter.wait(self.config.toggle_pause).await;
                self.set_managed(&device, true).await;
                paused?;
                self.waiter.wait(self.config.toggle_settle).await
            }
            RecoveryStage::RestartService => {
                info!("Restarting NetworkManager...");
                if let Err(e) = self.network.restart_manager().await {
                    warn!("Service restart had no effect: {e}");
                }
                self.waiter.wait(self.config.restart_settle).await
            }
            RecoveryStage::Monitor | RecoveryStage::Terminal => Ok(()),
        }
    }

    async fn set_managed(&self, device: &DeviceHandle, managed: bool) {
        if managed {
            info!("Switching to managed...");
        } else {
            info!("Switching to unmanaged...");
        }
        if let Err(e) = self.network.set_managed(device, managed).await {
            warn!(managed, "Managed toggle had no effect: {e}");
        }
    }

    fn log_summary(&self) {
        info!(summary = %self.stages.summary(), "Run finished");
        // Bounded by the stage machine's log capacity.
        match serde_json::to_string(self.stages.transitions()) {
            Ok(json) => tracing::debug!(transitions = %json, "Stage transition log"),
            Err(e) => warn!("Could not serialize transition log: {e}"),
        }
    }
}
