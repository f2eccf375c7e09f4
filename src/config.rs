//! Configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (the reference node's constants)
//! 2. A TOML file (`config/scanner.toml` by default)
//! 3. Environment variables prefixed with `RSSI_SCANNER_`, nested keys
//!    separated by `__`
//!
//! # Example
//! ```no_run
//! use rssi_scanner::config::ScannerConfig;
//!
//! // RSSI_SCANNER_DEVICE__PORT=/dev/ttyUSB0 overrides device.port
//! let config = ScannerConfig::load()?;
//! config.validate()?;
//! println!("Sweeping {}-{} MHz", config.scan.min_frequency, config.scan.max_frequency);
//! # Ok::<(), rssi_scanner::error::ScannerError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::acquisition::scheduler::{OpenSettings, SchedulerSettings};
use crate::band::{FrequencyBand, MAX_FREQ, MIN_FREQ, SCAN_STEP};
use crate::error::{ScannerError, ScannerResult};
use crate::link::DEFAULT_SET_ATTEMPTS;
use crate::logging::{parse_log_level, OutputFormat};
use crate::transport::serial::DEFAULT_BAUD_RATE;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/scanner.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RSSI_SCANNER_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serial device settings
    pub device: DeviceConfig,
    /// Scan mode settings
    pub scan: ScanConfig,
    /// Signal mode settings
    pub signal: SignalConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
        }
    }
}

/// Serial device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port path; required for hardware commands
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-exchange timeout in milliseconds
    pub timeout_ms: u64,
    /// Wait after opening before the first exchange, in milliseconds
    pub settle_ms: u64,
    /// Query the node API level at connect
    pub probe_api_level: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 100,
            settle_ms: 2000,
            probe_api_level: false,
        }
    }
}

/// Scan mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Lowest frequency swept (MHz)
    pub min_frequency: u16,
    /// Highest frequency swept (MHz)
    pub max_frequency: u16,
    /// Sweep step (MHz)
    pub step: u16,
    /// Tick period in milliseconds
    pub period_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_frequency: MIN_FREQ,
            max_frequency: MAX_FREQ,
            step: SCAN_STEP,
            period_ms: 100,
        }
    }
}

/// Signal mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Samples kept in each rolling buffer
    pub num_samples: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            period_ms: 50,
            num_samples: 200,
        }
    }
}

impl ScannerConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> ScannerResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ScannerResult<Self> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> ScannerResult<()> {
        parse_log_level(&self.application.log_level).map_err(ScannerError::Configuration)?;

        self.band()?;

        if self.scan.period_ms == 0 {
            return Err(ScannerError::Configuration(
                "scan.period_ms must be greater than zero".to_string(),
            ));
        }
        if self.signal.period_ms == 0 {
            return Err(ScannerError::Configuration(
                "signal.period_ms must be greater than zero".to_string(),
            ));
        }
        if self.signal.num_samples == 0 {
            return Err(ScannerError::Configuration(
                "signal.num_samples must be greater than zero".to_string(),
            ));
        }
        if self.device.timeout_ms == 0 {
            return Err(ScannerError::Configuration(
                "device.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.device.baud_rate == 0 {
            return Err(ScannerError::Configuration(
                "device.baud_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Frequency band described by the scan section.
    pub fn band(&self) -> ScannerResult<FrequencyBand> {
        FrequencyBand::new(
            self.scan.min_frequency,
            self.scan.max_frequency,
            self.scan.step,
        )
    }

    /// Serial port path, required for hardware access.
    pub fn port(&self) -> ScannerResult<&str> {
        self.device.port.as_deref().ok_or_else(|| {
            ScannerError::Configuration(format!(
                "device.port is not set (use --port or {ENV_PREFIX}DEVICE__PORT)"
            ))
        })
    }

    /// Worker periods and buffer sizes. Validates first.
    pub fn scheduler_settings(&self) -> ScannerResult<SchedulerSettings> {
        self.validate()?;
        Ok(SchedulerSettings {
            band: self.band()?,
            scan_period: Duration::from_millis(self.scan.period_ms),
            signal_period: Duration::from_millis(self.signal.period_ms),
            num_samples: self.signal.num_samples,
            set_attempts: DEFAULT_SET_ATTEMPTS,
        })
    }

    /// Device open parameters.
    pub fn open_settings(&self) -> OpenSettings {
        OpenSettings {
            timeout: Duration::from_millis(self.device.timeout_ms),
            settle: Duration::from_millis(self.device.settle_ms),
            probe_api_level: self.device.probe_api_level,
        }
    }
}
