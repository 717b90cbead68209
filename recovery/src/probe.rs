//! State Probe: fresh access-point observations for the watched interface.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{WatchdogError, WatchdogResult};
use crate::network::{DeviceHandle, NetworkControl};

/// Result of one probe. Never cached across iterations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointObservation {
    pub count: usize,
    pub active_ssid: Option<String>,
}

impl AccessPointObservation {
    pub fn has_access_points(&self) -> bool {
        self.count > 0
    }
}

/// Queries the collaborator for the current view of the interface.
///
/// The device is resolved again on every call: a service restart replaces
/// the device object, so a handle from an earlier probe may be stale.
pub struct StateProbe {
    network: Arc<dyn NetworkControl>,
    interface: String,
}

impl StateProbe {
    pub fn new(network: Arc<dyn NetworkControl>, interface: impl Into<String>) -> Self {
        Self {
            network,
            interface: interface.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Resolve the device for the watched interface at startup.
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::DeviceUnavailable` when the service has no
    /// such device or cannot be asked.
    pub async fn resolve(&self) -> WatchdogResult<DeviceHandle> {
        match self.network.resolve_device(&self.interface).await {
            Ok(device) => {
                debug!(interface = %self.interface, device = %device, "Device resolved");
                Ok(device)
            }
            Err(source) => Err(WatchdogError::DeviceUnavailable {
                interface: self.interface.clone(),
                source,
            }),
        }
    }

    /// Resolve the device mid-run.
    ///
    /// Returns `Ok(None)` when the lookup failed transiently (bus error or
    /// timeout, e.g. while the service restarts).
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::DeviceUnavailable` only when the service
    /// reports that the interface has no device.
    pub async fn locate(&self) -> WatchdogResult<Option<DeviceHandle>> {
        match self.resolve().await {
            Ok(device) => Ok(Some(device)),
            Err(WatchdogError::DeviceUnavailable { source, .. })
                if !source.is_device_missing() =>
            {
                warn!(interface = %self.interface, "Device lookup failed: {source}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Log driver and firmware details for the device.
    pub async fn describe(&self, device: &DeviceHandle) {
        match self.network.device_info(device).await {
            Ok(info) => info!(
                device = %info.interface,
                driver = %info.driver,
                driver_version = %info.driver_version,
                firmware_version = %info.firmware_version,
                "Wireless device"
            ),
            Err(e) => warn!(device = %device, "Could not read device info: {e}"),
        }
    }

    /// Take one observation.
    ///
    /// A transient lookup or listing failure is reported as zero access
    /// points rather than an error.
    pub async fn observe(&self) -> WatchdogResult<AccessPointObservation> {
        let Some(device) = self.locate().await? else {
            info!(count = 0, active_ap = "none", "Access point count");
            return Ok(AccessPointObservation {
                count: 0,
                active_ssid: None,
            });
        };

        let active_ssid = match self.network.active_ssid(&device).await {
            Ok(ssid) => ssid,
            Err(e) => {
                debug!("Active AP unavailable: {e}");
                None
            }
        };

        let count = match self.network.access_points(&device).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Listing access points failed, treating as none visible: {e}");
                0
            }
        };

        info!(
            count,
            active_ap = active_ssid.as_deref().unwrap_or("none"),
            "Access point count"
        );

        Ok(AccessPointObservation { count, active_ssid })
    }

    /// Ask for a rescan. Returns `false` if the request was rejected.
    pub async fn rescan(&self) -> WatchdogResult<bool> {
        let Some(device) = self.locate().await? else {
            warn!("Scan skipped, device lookup failed");
            return Ok(false);
        };
        info!("WiFi scan requested");
        match self.network.request_scan(&device).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Scan request had no effect: {e}");
                Ok(false)
            }
        }
    }
}
