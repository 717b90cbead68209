//! Collaborator capability: the narrow interface the engine depends on.
//!
//! Production implements [`NetworkControl`] over D-Bus; tests use mocks and
//! scripted fakes. [`TimedNetwork`] decorates any implementation with a
//! per-call timeout so a hung service cannot stall the watchdog.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Opaque reference to a resolved device (an object path on D-Bus).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle(pub String);

impl DeviceHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static facts about the wireless device, logged once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub interface: String,
    pub driver: String,
    pub driver_version: String,
    pub firmware_version: String,
}

/// Network-management service global logging level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerLogLevel {
    Info,
    Trace,
}

impl ManagerLogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for ManagerLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplicant debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplicantLogLevel {
    Info,
    MsgDump,
}

impl SupplicantLogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::MsgDump => "msgdump",
        }
    }

    /// Debug timestamps are switched on only at maximum verbosity.
    pub fn wants_timestamps(self) -> bool {
        matches!(self, Self::MsgDump)
    }
}

impl fmt::Display for SupplicantLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the watchdog needs from the network-management service, the
/// supplicant and the service manager.
///
/// All calls are awaited in sequence by a single flow. Implementations must
/// not cache access-point data across calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkControl: Send + Sync {
    /// Resolve the device object for an interface name.
    async fn resolve_device(&self, interface: &str) -> Result<DeviceHandle, NetworkError>;

    async fn device_info(&self, device: &DeviceHandle) -> Result<DeviceInfo, NetworkError>;

    /// Number of access points currently visible to the device.
    async fn access_points(&self, device: &DeviceHandle) -> Result<usize, NetworkError>;

    /// SSID of the associated access point, if any.
    async fn active_ssid(&self, device: &DeviceHandle) -> Result<Option<String>, NetworkError>;

    async fn request_scan(&self, device: &DeviceHandle) -> Result<(), NetworkError>;

    async fn set_managed(&self, device: &DeviceHandle, managed: bool) -> Result<(), NetworkError>;

    async fn set_manager_logging(&self, level: ManagerLogLevel) -> Result<(), NetworkError>;

    async fn set_supplicant_debug(&self, level: SupplicantLogLevel) -> Result<(), NetworkError>;

    async fn set_supplicant_timestamps(&self, enabled: bool) -> Result<(), NetworkError>;

    /// Ask the service manager to restart the network-management unit.
    /// Returns once the job is queued, not once the service is back.
    async fn restart_manager(&self) -> Result<(), NetworkError>;
}

/// Bounds every call on the inner [`NetworkControl`] with a timeout.
pub struct TimedNetwork {
    inner: Arc<dyn NetworkControl>,
    limit: Duration,
}

impl TimedNetwork {
    pub fn new(inner: Arc<dyn NetworkControl>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, NetworkError>
    where
        F: Future<Output = Result<T, NetworkError>> + Send,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, limit = ?self.limit, "Collaborator call timed out");
                Err(NetworkError::Timeout {
                    operation,
                    after: self.limit,
                })
            }
        }
    }
}

#[async_trait]
impl NetworkControl for TimedNetwork {
    async fn resolve_device(&self, interface: &str) -> Result<DeviceHandle, NetworkError> {
        self.bounded("resolve_device", self.inner.resolve_device(interface))
            .await
    }

    async fn device_info(&self, device: &DeviceHandle) -> Result<DeviceInfo, NetworkError> {
        self.bounded("device_info", self.inner.device_info(device))
            .await
    }

    async fn access_points(&self, device: &DeviceHandle) -> Result<usize, NetworkError> {
        self.bounded("access_points", self.inner.access_points(device))
            .await
    }

    async fn active_ssid(&self, device: &DeviceHandle) -> Result<Option<String>, NetworkError> {
        self.bounded("active_ssid", self.inner.active_ssid(device))
            .await
    }

    async fn request_scan(&self, device: &DeviceHandle) -> Result<(), NetworkError> {
        self.bounded("request_scan", self.inner.request_scan(device))
            .await
    }

    async fn set_managed(&self, device: &DeviceHandle, managed: bool) -> Result<(), NetworkError> {
        self.bounded("set_managed", self.inner.set_managed(device, managed))
            .await
    }

    async fn set_manager_logging(&self, level: ManagerLogLevel) -> Result<(), NetworkError> {
        self.bounded("set_manager_logging", self.inner.set_manager_logging(level))
            .await
    }

    async fn set_supplicant_debug(&self, level: SupplicantLogLevel) -> Result<(), NetworkError> {
        self.bounded(
            "set_supplicant_debug",
            self.inner.set_supplicant_debug(level),
        )
        .await
    }

    async fn set_supplicant_timestamps(&self, enabled: bool) -> Result<(), NetworkError> {
        self.bounded(
            "set_supplicant_timestamps",
            self.inner.set_supplicant_timestamps(enabled),
        )
        .await
    }

    async fn restart_manager(&self) -> Result<(), NetworkError> {
        self.bounded("restart_manager", self.inner.restart_manager())
            .await
    }
}
