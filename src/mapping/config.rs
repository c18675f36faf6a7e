//! Configuration loader and validator
//!
//! Loads bridge settings from TOML files in the configs/ directory. Every
//! field has a default, so a partial (or empty) file is valid.

use crate::joycon::connection::SessionSettings;
use crate::retry::RetryPolicy;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub input: InputSettings,

    #[serde(default)]
    pub watcher: WatcherSettings,

    #[serde(default)]
    pub battery: BatterySettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

/// Device discovery and command timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Attempts to find and open a device
    #[serde(default = "default_open_attempts")]
    pub open_attempts: u32,

    /// Delay between open attempts
    #[serde(default = "default_open_retry_delay_ms")]
    pub open_retry_delay_ms: u64,

    /// Reads to wait for a sub-command reply
    #[serde(default = "default_reply_attempts")]
    pub reply_attempts: u32,

    /// Longest wait of a single reply read
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Read loop wake interval, bounds how long stopping a session takes
    #[serde(default = "default_read_wake_ms")]
    pub read_wake_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            open_attempts: default_open_attempts(),
            open_retry_delay_ms: default_open_retry_delay_ms(),
            reply_attempts: default_reply_attempts(),
            reply_timeout_ms: default_reply_timeout_ms(),
            read_wake_ms: default_read_wake_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Stick deadzone (0.0 to 1.0, exclusive)
    #[serde(default)]
    pub stick_deadzone: f32,

    /// Light the player LEDs with the virtual pad slot
    #[serde(default = "default_true")]
    pub player_lights: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            stick_deadzone: 0.0,
            player_lights: true,
        }
    }
}

/// Hot-plug polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySettings {
    #[serde(default = "default_true")]
    pub low_battery_alert: bool,
}

impl Default for BatterySettings {
    fn default() -> Self {
        Self { low_battery_alert: true }
    }
}

/// Known controller cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_open_attempts() -> u32 { 10 }
fn default_open_retry_delay_ms() -> u64 { 1000 }
fn default_reply_attempts() -> u32 { 4 }
fn default_reply_timeout_ms() -> u64 { 100 }
fn default_read_wake_ms() -> u64 { 200 }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_true() -> bool { true }

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        debug!("  - Connection: {:?}", config.connection);
        debug!("  - Watcher: {:?}", config.watcher);
        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.connection;
        if c.open_attempts == 0 {
            return Err(ConfigError::Invalid("open_attempts must be at least 1".into()));
        }
        if c.reply_attempts == 0 {
            return Err(ConfigError::Invalid("reply_attempts must be at least 1".into()));
        }
        if c.read_wake_ms == 0 {
            return Err(ConfigError::Invalid("read_wake_ms must be positive".into()));
        }

        let deadzone = self.input.stick_deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(ConfigError::Invalid(
                "stick_deadzone must be between 0.0 and 1.0".into(),
            ));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Session settings derived from the connection section.
    ///
    /// Player lights are filled in per device once its pad slot is known.
    pub fn session_settings(&self) -> SessionSettings {
        let c = &self.connection;
        SessionSettings {
            open_policy: RetryPolicy::new(c.open_attempts, Duration::from_millis(c.open_retry_delay_ms)),
            reply_policy: RetryPolicy::immediate(c.reply_attempts),
            reply_timeout: Duration::from_millis(c.reply_timeout_ms),
            read_wake: Duration::from_millis(c.read_wake_ms),
            player_lights: None,
        }
    }

    pub fn watcher_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.poll_interval_ms)
    }
}
