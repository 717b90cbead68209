//! Interruptible Waiter: the only suspension point in a run.
//!
//! The pause races a [`CancellationToken`]. Cancellation (SIGINT or SIGTERM
//! in the binary, a direct `cancel()` in tests) tears the diagnostic session
//! down before the caller sees `WatchdogError::Interrupted`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{WatchdogError, WatchdogResult};
use crate::session::DiagnosticSession;

pub struct Waiter {
    cancel: CancellationToken,
    session: Arc<DiagnosticSession>,
}

impl Waiter {
    pub fn new(cancel: CancellationToken, session: Arc<DiagnosticSession>) -> Self {
        Self { cancel, session }
    }

    /// Sleep for `duration` unless interrupted.
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::Interrupted` after `DiagnosticSession::end`
    /// has completed.
    pub async fn wait(&self, duration: Duration) -> WatchdogResult<()> {
        debug!("Sleeping {} seconds...", duration.as_secs_f64());

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Interrupt received, restoring logging");
                self.session.end().await;
                Err(WatchdogError::Interrupted)
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
