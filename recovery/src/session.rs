//! Diagnostic Session Controller.
//!
//! Brackets a monitoring run with raised log verbosity on the
//! network-management service and the supplicant. Teardown may be requested
//! from the loop, the interrupt path, or terminal exhaustion; only the first
//! request reaches the services.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::network::{ManagerLogLevel, NetworkControl, SupplicantLogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not started; logging untouched.
    Idle,
    /// Monitoring with maximum verbosity.
    Verbose,
    /// Restored to informational levels. Final.
    Normal,
}

pub struct DiagnosticSession {
    network: Arc<dyn NetworkControl>,
    state: Mutex<SessionState>,
}

impl DiagnosticSession {
    pub fn new(network: Arc<dyn NetworkControl>) -> Self {
        Self {
            network,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Raise both services to their most verbose level.
    ///
    /// Failures are logged; a run without verbose logs is still worth doing.
    pub async fn begin(&self) {
        let mut state = self.state.lock().await;
        if *state != SessionState::Idle {
            return;
        }
        self.apply(ManagerLogLevel::Trace, SupplicantLogLevel::MsgDump)
            .await;
        *state = SessionState::Verbose;
    }

    /// Restore informational logging. Idempotent.
    ///
    /// Returns `true` if this call performed the teardown.
    pub async fn end(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            SessionState::Normal => false,
            SessionState::Idle => {
                *state = SessionState::Normal;
                false
            }
            SessionState::Verbose => {
                self.apply(ManagerLogLevel::Info, SupplicantLogLevel::Info)
                    .await;
                *state = SessionState::Normal;
                info!("Exiting...");
                true
            }
        }
    }

    async fn apply(&self, manager: ManagerLogLevel, supplicant: SupplicantLogLevel) {
        info!(level = %manager, "Setting NetworkManager log level");
        if let Err(e) = self.network.set_manager_logging(manager).await {
            warn!("Failed to set NetworkManager log level: {e}");
        }

        info!(level = %supplicant, "Setting wpa_supplicant log level");
        if supplicant.wants_timestamps() {
            if let Err(e) = self.network.set_supplicant_timestamps(true).await {
                warn!("Failed to enable wpa_supplicant debug timestamps: {e}");
            }
        }
        if let Err(e) = self.network.set_supplicant_debug(supplicant).await {
            warn!("Failed to set wpa_supplicant log level: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::network::MockNetworkControl;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[tokio::test]
    async fn begin_raises_both_services_with_timestamps() {
        let mut mock = MockNetworkControl::new();
        let mut seq = Sequence::new();
        mock.expect_set_manager_logging()
            .with(eq(ManagerLogLevel::Trace))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_set_supplicant_timestamps()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_set_supplicant_debug()
            .with(eq(SupplicantLogLevel::MsgDump))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let session = DiagnosticSession::new(Arc::new(mock));
        session.begin().await;
        assert_eq!(session.state().await, SessionState::Verbose);
    }

    #[tokio::test]
    async fn end_restores_exactly_once() {
        let mut mock = MockNetworkControl::new();
        mock.expect_set_manager_logging()
            .with(eq(ManagerLogLevel::Trace))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_set_supplicant_timestamps()
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_set_supplicant_debug()
            .with(eq(SupplicantLogLevel::MsgDump))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_set_manager_logging()
            .with(eq(ManagerLogLevel::Info))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_set_supplicant_debug()
            .with(eq(SupplicantLogLevel::Info))
            .times(1)
            .returning(|_| Ok(()));

        let session = DiagnosticSession::new(Arc::new(mock));
        session.begin().await;
        assert!(session.end().await);
        assert!(!session.end().await);
        assert!(!session.end().await);
        assert_eq!(session.state().await, SessionState::Normal);
    }

    #[tokio::test]
    async fn end_without_begin_touches_nothing() {
        let mock = MockNetworkControl::new();
        let session = DiagnosticSession::new(Arc::new(mock));
        assert!(!session.end().await);
        assert_eq!(session.state().await, SessionState::Normal);

        // A late begin after teardown must not raise verbosity again.
        session.begin().await;
        assert_eq!(session.state().await, SessionState::Normal);
    }

    #[tokio::test]
    async fn failures_do_not_block_teardown() {
        let mut mock = MockNetworkControl::new();
        mock.expect_set_manager_logging()
            .returning(|_| Err(NetworkError::bus("SetLogging", "access denied")));
        mock.expect_set_supplicant_timestamps()
            .returning(|_| Err(NetworkError::bus("Set", "service unknown")));
        mock.expect_set_supplicant_debug()
            .returning(|_| Err(NetworkError::bus("Set", "service unknown")));

        let session = DiagnosticSession::new(Arc::new(mock));
        session.begin().await;
        assert_eq!(session.state().await, SessionState::Verbose);
        assert!(session.end().await);
        assert_eq!(session.state().await, SessionState::Normal);
    }
}
