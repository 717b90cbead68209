//! Shutdown signals.
//!
//! Both Ctrl-C (SIGINT) and a supervisor stop (SIGTERM) cancel the run
//! token. The engine's waiter notices at its next pause and restores the
//! services' log levels before the process exits.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Install signal handlers and spawn a task that cancels `cancel` on the
/// first shutdown signal. Handlers are registered before this returns.
///
/// The task also ends quietly if `cancel` is cancelled by someone else.
///
/// # Errors
///
/// Fails if a handler cannot be registered.
#[cfg(unix)]
pub fn spawn_listener(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!(signal = name, "Shutdown signal received");
        cancel.cancel();
    }))
}

#[cfg(not(unix))]
pub fn spawn_listener(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!(signal = "ctrl-c", "Shutdown signal received");
                    cancel.cancel();
                }
            }
        }
    }))
}
