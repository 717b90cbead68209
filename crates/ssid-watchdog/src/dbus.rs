//! System-bus backend for [`NetworkControl`].
//!
//! Talks to three services:
//! - NetworkManager (`org.freedesktop.NetworkManager`): devices, access
//!   points, scans, the `Managed` flag, global logging
//! - wpa_supplicant (`fi.w1.wpa_supplicant1`): debug level and timestamps
//! - systemd (`org.freedesktop.systemd1`): restarting the NetworkManager unit
//!
//! Proxies are built per call with property caching disabled so every read
//! reflects the live device.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use recovery::{
    DeviceHandle, DeviceInfo, ManagerLogLevel, NetworkControl, NetworkError, SupplicantLogLevel,
};
use tracing::debug;
use zbus::zvariant::{OwnedObjectPath, Value};
use zbus::{proxy, CacheProperties, Connection};

/// `NM_DEVICE_TYPE_WIFI`
const DEVICE_TYPE_WIFI: u32 = 2;

/// Object path NetworkManager uses for "no object".
const NO_OBJECT: &str = "/";

/// Error NetworkManager returns when it has no device for an interface.
const UNKNOWN_DEVICE_ERROR: &str = "org.freedesktop.NetworkManager.UnknownDevice";

/// Logging domains passed to `SetLogging`.
const LOG_DOMAINS: &str = "all";

#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
trait NetworkManager {
    fn get_device_by_ip_iface(&self, iface: &str) -> zbus::Result<OwnedObjectPath>;

    fn set_logging(&self, level: &str, domains: &str) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
trait Device {
    #[zbus(property)]
    fn device_type(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn interface(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn driver(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn driver_version(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn firmware_version(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn managed(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_managed(&self, value: bool) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Device.Wireless",
    default_service = "org.freedesktop.NetworkManager"
)]
trait Wireless {
    fn get_all_access_points(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn request_scan(&self, options: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    #[zbus(property)]
    fn active_access_point(&self) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.AccessPoint",
    default_service = "org.freedesktop.NetworkManager"
)]
trait AccessPoint {
    #[zbus(property)]
    fn ssid(&self) -> zbus::Result<Vec<u8>>;
}

#[proxy(
    interface = "fi.w1.wpa_supplicant1",
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1"
)]
trait Supplicant {
    #[zbus(property)]
    fn debug_level(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn set_debug_level(&self, value: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn debug_timestamp(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_debug_timestamp(&self, value: bool) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait SystemdManager {
    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
}

fn bus_error(operation: &'static str) -> impl Fn(zbus::Error) -> NetworkError {
    move |e| NetworkError::bus(operation, e.to_string())
}

fn is_unknown_device(error_name: &str) -> bool {
    error_name == UNKNOWN_DEVICE_ERROR
}

/// Only an explicit "unknown device" reply means the interface is absent.
/// Anything else (service not running, access denied, dropped connection)
/// is a transient bus failure.
fn device_lookup_error(interface: &str, error: zbus::Error) -> NetworkError {
    match &error {
        zbus::Error::MethodError(name, ..) if is_unknown_device(name.as_str()) => {
            NetworkError::device_not_found(interface)
        }
        _ => NetworkError::bus("GetDeviceByIpIface", error.to_string()),
    }
}

/// Connection to the system bus plus the unit name to restart.
pub struct SystemBus {
    connection: Connection,
    manager_unit: String,
}

impl SystemBus {
    pub async fn connect(manager_unit: impl Into<String>) -> Result<Self> {
        let connection = Connection::system()
            .await
            .context("Failed to connect to the system bus")?;
        Ok(Self {
            connection,
            manager_unit: manager_unit.into(),
        })
    }

    async fn manager(&self) -> Result<NetworkManagerProxy<'static>, NetworkError> {
        NetworkManagerProxy::builder(&self.connection)
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(bus_error("NetworkManager proxy"))
    }

    async fn device<'a>(&self, device: &'a DeviceHandle) -> Result<DeviceProxy<'a>, NetworkError> {
        DeviceProxy::builder(&self.connection)
            .path(device.as_str())
            .map_err(bus_error("Device proxy"))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(bus_error("Device proxy"))
    }

    async fn wireless<'a>(
        &self,
        device: &'a DeviceHandle,
    ) -> Result<WirelessProxy<'a>, NetworkError> {
        WirelessProxy::builder(&self.connection)
            .path(device.as_str())
            .map_err(bus_error("Wireless proxy"))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(bus_error("Wireless proxy"))
    }

    async fn supplicant(&self) -> Result<SupplicantProxy<'static>, NetworkError> {
        SupplicantProxy::builder(&self.connection)
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(bus_error("wpa_supplicant proxy"))
    }
}

#[async_trait]
impl NetworkControl for SystemBus {
    async fn resolve_device(&self, interface: &str) -> Result<DeviceHandle, NetworkError> {
        let path = self
            .manager()
            .await?
            .get_device_by_ip_iface(interface)
            .await
            .map_err(|e| device_lookup_error(interface, e))?;
        let handle = DeviceHandle::new(path.as_str());

        let device_type = self
            .device(&handle)
            .await?
            .device_type()
            .await
            .map_err(bus_error("DeviceType"))?;
        if device_type != DEVICE_TYPE_WIFI {
            debug!(%interface, device_type, "Interface is not a wireless device");
            return Err(NetworkError::device_not_found(interface));
        }

        Ok(handle)
    }

    async fn device_info(&self, device: &DeviceHandle) -> Result<DeviceInfo, NetworkError> {
        let proxy = self.device(device).await?;
        Ok(DeviceInfo {
            interface: proxy.interface().await.map_err(bus_error("Interface"))?,
            driver: proxy.driver().await.map_err(bus_error("Driver"))?,
            driver_version: proxy
                .driver_version()
                .await
                .map_err(bus_error("DriverVersion"))?,
            firmware_version: proxy
                .firmware_version()
                .await
                .map_err(bus_error("FirmwareVersion"))?,
        })
    }

    async fn access_points(&self, device: &DeviceHandle) -> Result<usize, NetworkError> {
        let points = self
            .wireless(device)
            .await?
            .get_all_access_points()
            .await
            .map_err(bus_error("GetAllAccessPoints"))?;
        Ok(points.len())
    }

    async fn active_ssid(&self, device: &DeviceHandle) -> Result<Option<String>, NetworkError> {
        let active = self
            .wireless(device)
            .await?
            .active_access_point()
            .await
            .map_err(bus_error("ActiveAccessPoint"))?;
        if active.as_str() == NO_OBJECT {
            return Ok(None);
        }

        let ssid = AccessPointProxy::builder(&self.connection)
            .path(active.as_str())
            .map_err(bus_error("AccessPoint proxy"))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(bus_error("AccessPoint proxy"))?
            .ssid()
            .await
            .map_err(bus_error("Ssid"))?;

        if ssid.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&ssid).into_owned()))
    }

    async fn request_scan(&self, device: &DeviceHandle) -> Result<(), NetworkError> {
        self.wireless(device)
            .await?
            .request_scan(HashMap::new())
            .await
            .map_err(bus_error("RequestScan"))
    }

    async fn set_managed(&self, device: &DeviceHandle, managed: bool) -> Result<(), NetworkError> {
        self.device(device)
            .await?
            .set_managed(managed)
            .await
            .map_err(bus_error("Set Managed"))
    }

    async fn set_manager_logging(&self, level: ManagerLogLevel) -> Result<(), NetworkError> {
        self.manager()
            .await?
            .set_logging(level.as_str(), LOG_DOMAINS)
            .await
            .map_err(bus_error("SetLogging"))
    }

    async fn set_supplicant_debug(&self, level: SupplicantLogLevel) -> Result<(), NetworkError> {
        self.supplicant()
            .await?
            .set_debug_level(level.as_str())
            .await
            .map_err(bus_error("Set DebugLevel"))
    }

    async fn set_supplicant_timestamps(&self, enabled: bool) -> Result<(), NetworkError> {
        self.supplicant()
            .await?
            .set_debug_timestamp(enabled)
            .await
            .map_err(bus_error("Set DebugTimestamp"))
    }

    async fn restart_manager(&self) -> Result<(), NetworkError> {
        let job = SystemdManagerProxy::new(&self.connection)
            .await
            .map_err(bus_error("systemd proxy"))?
            .restart_unit(&self.manager_unit, "replace")
            .await
            .map_err(bus_error("RestartUnit"))?;
        debug!(unit = %self.manager_unit, job = %job.as_str(), "Restart job queued");
        Ok(())
    }
}
