//! Error taxonomy for the watchdog core.
//!
//! Two layers:
//! - [`NetworkError`] is what a collaborator call can fail with. The engine
//!   treats these as transient, except `DeviceNotFound` during resolution.
//! - [`WatchdogError`] is what ends a run early.
//!
//! | Kind              | Fatal | Handling                                    |
//! |-------------------|-------|---------------------------------------------|
//! | DeviceUnavailable | yes   | abort before (or out of) the monitor loop   |
//! | Interrupted       | no    | session teardown, reported as an outcome    |
//! | IllegalTransition | yes   | stage machine bug, surfaced as-is           |

use std::time::Duration;

use thiserror::Error;

use crate::stage::IllegalTransition;

/// Result alias for watchdog operations.
pub type WatchdogResult<T> = Result<T, WatchdogError>;

/// Failure of a single collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The network-management service has no device for this interface.
    #[error("no device found for interface '{interface}'")]
    DeviceNotFound { interface: String },

    /// The bus call itself failed (rejected, not permitted, service gone).
    #[error("{operation} failed: {message}")]
    Bus { operation: String, message: String },

    /// The call did not complete within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl NetworkError {
    /// Create a bus error
    pub fn bus(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bus {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a device not found error
    pub fn device_not_found(interface: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            interface: interface.into(),
        }
    }

    /// Whether the service answered and has no such device. Every other
    /// kind is transient: the service may be restarting or slow.
    pub fn is_device_missing(&self) -> bool {
        matches!(self, Self::DeviceNotFound { .. })
    }
}

/// Conditions that end a monitoring run before it reaches a normal outcome.
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// Target interface cannot be resolved. The run cannot proceed.
    #[error("device for interface '{interface}' unavailable: {source}")]
    DeviceUnavailable {
        interface: String,
        #[source]
        source: NetworkError,
    },

    /// An external interrupt arrived during a wait; teardown already ran.
    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl WatchdogError {
    /// Whether this is a voluntary stop rather than a failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
