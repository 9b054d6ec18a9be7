//! Application configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub store: StoreConfig,
    pub timer: TimerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub socket_path: String,
    pub log_level: String,
    /// Write store state to disk after every mutation
    #[serde(default = "default_persist")]
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    /// Countdown before a start is written, in seconds
    pub countdown_seconds: u32,
    /// Period of the ticking projection while running, in milliseconds
    pub tick_interval_ms: u64,
    /// How long a fetched clock offset is reused, in milliseconds
    pub offset_refresh_ms: u64,
    #[serde(default)]
    pub write_policy: WritePolicy,
}

/// How start and stop publish their read-then-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Plain overwrite; concurrent admins race and the last write wins.
    #[default]
    LastWriteWins,
    /// Write only if the record still equals what was read.
    CompareAndSet,
}

fn default_persist() -> bool {
    true
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.timer.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            store: StoreConfig::default(),
            timer: TimerConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Validate store connection configuration
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.trim().is_empty() {
            return Err(Error::Validation("Socket path cannot be empty".to_string()));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/racetimer.sock".to_string(),
            log_level: "info".to_string(),
            persist: true,
        }
    }
}

impl TimerConfig {
    /// Validate timer configuration
    pub fn validate(&self) -> Result<()> {
        const MAX_COUNTDOWN: u32 = 60;
        if self.countdown_seconds > MAX_COUNTDOWN {
            return Err(Error::Validation(format!(
                "Countdown too long (max {} seconds)",
                MAX_COUNTDOWN
            )));
        }

        if self.tick_interval_ms == 0 || self.tick_interval_ms >= 100 {
            return Err(Error::Validation(
                "Tick interval must be between 1 and 99 milliseconds".to_string(),
            ));
        }

        if self.offset_refresh_ms < self.tick_interval_ms {
            return Err(Error::Validation(
                "Offset refresh cannot be shorter than the tick interval".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 5,
            tick_interval_ms: 50,
            offset_refresh_ms: 1000,
            write_policy: WritePolicy::LastWriteWins,
        }
    }
}
