//! Wi-Fi Recovery Core
//!
//! Deterministic escalation logic for a single-interface connectivity
//! watchdog:
//! - `stage`: ordered remediation stages with transition guards
//! - `probe`: fresh access-point observations
//! - `session`: verbose-logging bracket around a run, idempotent teardown
//! - `waiter`: cancellable pauses, the only suspension point
//! - `engine`: the monitoring loop tying them together
//! - `network`: the collaborator trait and its timeout decorator
//!
//! Nothing here talks to D-Bus; the binary crate supplies a
//! [`NetworkControl`] implementation.

#![allow(clippy::uninlined_format_args)]

pub mod engine;
pub mod error;
pub mod network;
pub mod probe;
pub mod session;
pub mod stage;
pub mod waiter;

pub use engine::{EngineConfig, RecoveryEngine, RunOutcome};
pub use error::{NetworkError, WatchdogError, WatchdogResult};
pub use network::{
    DeviceHandle, DeviceInfo, ManagerLogLevel, NetworkControl, SupplicantLogLevel, TimedNetwork,
};
pub use probe::{AccessPointObservation, StateProbe};
pub use session::{DiagnosticSession, SessionState};
pub use stage::{IllegalTransition, RecoveryStage, StageMachine, TransitionRecord};
pub use waiter::Waiter;

pub use tokio_util::sync::CancellationToken;
