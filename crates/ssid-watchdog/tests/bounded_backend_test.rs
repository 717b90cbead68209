//! A backend that never answers must not stall the watchdog: calls time out,
//! are treated as "no effect", and escalation still reaches its end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recovery::{
    CancellationToken, DeviceHandle, DeviceInfo, EngineConfig, ManagerLogLevel, NetworkControl,
    NetworkError, RecoveryEngine, RecoveryStage, RunOutcome, SupplicantLogLevel,
};
use ssid_watchdog::{bounded_network, WatchdogConfig};

/// Resolves the device, then hangs on every other call.
#[derive(Default)]
struct UnresponsiveBackend {
    resolves: AtomicUsize,
}

async fn hang<T>() -> Result<T, NetworkError> {
    std::future::pending().await
}

#[async_trait::async_trait]
impl NetworkControl for UnresponsiveBackend {
    async fn resolve_device(&self, _interface: &str) -> Result<DeviceHandle, NetworkError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceHandle::new("/org/freedesktop/NetworkManager/Devices/4"))
    }
    async fn device_info(&self, _device: &DeviceHandle) -> Result<DeviceInfo, NetworkError> {
        hang().await
    }
    async fn access_points(&self, _device: &DeviceHandle) -> Result<usize, NetworkError> {
        hang().await
    }
    async fn active_ssid(&self, _device: &DeviceHandle) -> Result<Option<String>, NetworkError> {
        hang().await
    }
    async fn request_scan(&self, _device: &DeviceHandle) -> Result<(), NetworkError> {
        hang().await
    }
    async fn set_managed(&self, _device: &DeviceHandle, _managed: bool) -> Result<(), NetworkError> {
        hang().await
    }
    async fn set_manager_logging(&self, _level: ManagerLogLevel) -> Result<(), NetworkError> {
        hang().await
    }
    async fn set_supplicant_debug(&self, _level: SupplicantLogLevel) -> Result<(), NetworkError> {
        hang().await
    }
    async fn set_supplicant_timestamps(&self, _enabled: bool) -> Result<(), NetworkError> {
        hang().await
    }
    async fn restart_manager(&self) -> Result<(), NetworkError> {
        hang().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_backend_times_out_and_exhausts() {
    let config = WatchdogConfig {
        engine: EngineConfig::default(),
        call_timeout: Duration::from_secs(2),
        manager_unit: "NetworkManager.service".into(),
    };
    let backend = Arc::new(UnresponsiveBackend::default());
    let network = bounded_network(backend.clone(), &config);

    let mut engine = RecoveryEngine::new(
        network,
        "wlan0",
        config.engine.clone(),
        CancellationToken::new(),
    );
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Exhausted);
    assert_eq!(engine.stages().current(), RecoveryStage::Terminal);
    // startup + 4 probes + rescan + toggle
    assert_eq!(backend.resolves.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_still_honoured_with_hung_backend() {
    let config = WatchdogConfig::from_lookup(|_| None);
    let network = bounded_network(Arc::new(UnresponsiveBackend::default()), &config);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut engine = RecoveryEngine::new(network, "wlan0", config.engine.clone(), cancel);
    let outcome = engine.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(engine.stages().current(), RecoveryStage::Monitor);
}
