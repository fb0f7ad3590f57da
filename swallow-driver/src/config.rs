use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use swallow_core::protocol::BAUD_RATE;
use swallow_core::{ByteOrder, DEFAULT_OUTLIER_THRESHOLD};

#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM1";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Seconds to wait after a request before polling for the response.
pub const DEFAULT_SETTLE_DELAY_SECS: f64 = 10.0;
/// Write/settle/poll rounds per cycle before giving up on a short frame.
pub const DEFAULT_READ_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOOP_INTERVAL_SECS: f64 = 60.0;
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station: StationConfig,
    pub acquisition: AcquisitionConfig,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Serial device path
    pub port: String,
    /// Seconds between acquisition cycles
    pub loop_interval: f64,
    /// Nonzero raises per-field and per-attempt diagnostics to info level
    pub debug_read: u8,
    /// Byte order of multi-byte payload fields
    pub byte_order: ByteOrder,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub settle_delay_secs: f64,
    pub read_attempts: u32,
    /// Largest accepted outside temperature jump between readings, in °C
    pub outlier_threshold: f64,
    /// Give up after this many failed cycles. Unbounded when absent.
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkConfig {
    Serial {
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Simulated {
        /// Fraction of requests answered with a truncated frame
        #[serde(default)]
        short_read_ratio: f64,
        /// Fraction of frames with a flipped payload bit
        #[serde(default)]
        corrupt_ratio: f64,
    },
}

fn default_baud_rate() -> u32 {
    BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("serial port path is empty")]
    EmptyPort,
    #[error("loop_interval must be a positive number of seconds, got {0}")]
    LoopInterval(f64),
    #[error("settle_delay_secs must be zero or more seconds, got {0}")]
    SettleDelay(f64),
    #[error("read_attempts must be at least 1")]
    ReadAttempts,
    #[error("outlier_threshold must be positive, got {0}")]
    OutlierThreshold(f64),
    #[error("max_cycles must be at least 1")]
    MaxCycles,
    #[error("{name} must be within 0..=1, got {value}")]
    Ratio { name: &'static str, value: f64 },
    #[error("baud_rate must be nonzero")]
    BaudRate,
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let station = &self.station;
        if station.port.trim().is_empty() {
            return Err(ConfigError::EmptyPort);
        }
        if !(station.loop_interval.is_finite() && station.loop_interval > 0.0) {
            return Err(ConfigError::LoopInterval(station.loop_interval));
        }

        let acquisition = &self.acquisition;
        if !(acquisition.settle_delay_secs.is_finite() && acquisition.settle_delay_secs >= 0.0) {
            return Err(ConfigError::SettleDelay(acquisition.settle_delay_secs));
        }
        if acquisition.read_attempts == 0 {
            return Err(ConfigError::ReadAttempts);
        }
        if !(acquisition.outlier_threshold.is_finite() && acquisition.outlier_threshold > 0.0) {
            return Err(ConfigError::OutlierThreshold(acquisition.outlier_threshold));
        }
        if acquisition.max_cycles == Some(0) {
            return Err(ConfigError::MaxCycles);
        }

        match self.link {
            LinkConfig::Serial { baud_rate, .. } if baud_rate == 0 => Err(ConfigError::BaudRate),
            LinkConfig::Simulated {
                short_read_ratio,
                corrupt_ratio,
            } => {
                check_ratio("short_read_ratio", short_read_ratio)?;
                check_ratio("corrupt_ratio", corrupt_ratio)
            }
            LinkConfig::Serial { .. } => Ok(()),
        }
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.station.loop_interval)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_LOOP_INTERVAL_SECS))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.acquisition.settle_delay_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_SETTLE_DELAY_SECS))
    }

    pub fn debug_read(&self) -> bool {
        self.station.debug_read > 0
    }
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Ratio { name, value })
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            loop_interval: DEFAULT_LOOP_INTERVAL_SECS,
            debug_read: 0,
            byte_order: ByteOrder::Little,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            max_cycles: None,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::Serial {
            baud_rate: BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}
