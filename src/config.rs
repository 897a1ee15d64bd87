//! Shipper and transport configuration.
//!
//! Both halves deserialize from JSON with every key optional; missing keys
//! take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_CHECKPOINT_PATH: &str = "remote_logger_data.bin";
pub const DEFAULT_DELIMITER: &str = "REMOTE_LOGGER_STATE_DEMARCATION";
pub const DEFAULT_HOST: &str = "en6msadu8lecg.x.pipedream.net";
pub const DEFAULT_PORT: u16 = 80;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shipper: ShipperConfig,
    pub transport: TransportConfig,
}

impl Config {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Config = serde_json::from_slice(&raw)?;
        config.shipper.validate()?;
        Ok(config)
    }
}

/// Configuration for the queue, worker and checkpoint side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Where undelivered records are parked across restarts.
    /// Relative paths resolve against the working directory.
    pub checkpoint_path: PathBuf,

    /// Token bounding every record in the checkpoint file. Must be non-empty
    /// and must not occur inside payloads.
    pub delimiter: String,

    pub backoff: BackoffConfig,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            delimiter: DEFAULT_DELIMITER.to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ShipperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::Config("checkpoint delimiter must not be empty"));
        }
        if self.backoff.initial_ms == 0 {
            return Err(Error::Config("initial backoff must be non-zero"));
        }
        Ok(())
    }
}

/// Reconnect backoff. The delay doubles after every failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    /// Default: 1000 ms
    pub initial_ms: u64,

    /// Optional ceiling on the delay. `None` keeps doubling without bound.
    /// Default: None
    pub max_ms: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            max_ms: None,
        }
    }
}

impl BackoffConfig {
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max(&self) -> Option<Duration> {
        self.max_ms.map(Duration::from_millis)
    }
}

/// Configuration for the TCP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Remote host; also sent as the `Host` header of every frame.
    pub host: String,

    pub port: u16,

    /// How long a send may wait on a full outbound buffer before the
    /// connection is treated as dead.
    /// Default: 5000 ms
    pub send_timeout_ms: u64,

    /// Upper bound on a single writability poll while waiting out backpressure.
    /// Default: 100 ms
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            send_timeout_ms: 5000,
            poll_interval_ms: 100,
        }
    }
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
