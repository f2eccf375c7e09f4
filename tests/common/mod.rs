//! Shared helpers for controller-level tests.

#![allow(dead_code)]

use rssi_scanner::channels::PresentationChannels;
use rssi_scanner::config::ScannerConfig;
use rssi_scanner::transport::{DynTransport, MockDevice, MockHandle};
use rssi_scanner::ModeController;
use std::time::{Duration, Instant};

/// Fast periods and no settle time so tests run in milliseconds.
pub fn test_config() -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.device.settle_ms = 0;
    config.device.timeout_ms = 20;
    config.scan.period_ms = 10;
    config.signal.period_ms = 10;
    config.signal.num_samples = 32;
    config
}

/// Connect a controller to a fresh mock node.
pub fn connect_mock(
    config: &ScannerConfig,
    device: MockDevice,
) -> (ModeController, PresentationChannels, MockHandle) {
    let mock = device.handle();
    let (controller, channels) =
        ModeController::connect(config, move || Ok(Box::new(device) as DynTransport))
            .expect("mock device opens");
    (controller, channels, mock)
}

/// Poll `condition` every 5 ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
