//! # Configuration
//!
//! Layered, validated configuration for the pipeline core. Values resolve
//! in order:
//!
//! 1. compiled defaults from [`crate::constants`]
//! 2. an optional config file (`CITELINE_CONFIG_PATH`, else
//!    `config/citeline.yaml` or `config/citeline.toml`)
//! 3. `CITELINE__`-prefixed environment variables, `__` separating nested
//!    keys (`CITELINE__EXECUTION__DEFAULT_CONCURRENCY=8`)
//!
//! Every load validates before anything consumes the config, so invalid
//! values fail at startup rather than mid-batch.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use citeline_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let concurrency = manager.config().execution.default_concurrency;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::system::{
    BACKOFF_BASE_DELAY_MS, BACKOFF_MAX_DELAY_MS, BACKOFF_MULTIPLIER, DEFAULT_CONCURRENCY,
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_PROGRESS_CHANNEL_CAPACITY,
};

/// Root configuration for the pipeline core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub execution: ExecutionConfig,
    pub backoff: BackoffConfig,
    pub events: EventsConfig,
    pub dedup: DedupConfig,
}

/// Batch execution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Items in flight per batch unless the caller overrides it
    pub default_concurrency: usize,
    /// Bound on buffered progress snapshots per batch
    pub progress_channel_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

/// Retry backoff settings for network-class failures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: BACKOFF_BASE_DELAY_MS,
            max_delay_ms: BACKOFF_MAX_DELAY_MS,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Event channel settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// How far a slow subscriber may lag before it misses events
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// URL normalization toggles for duplicate detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub strip_www: bool,
    pub strip_trailing_slash: bool,
    pub percent_decode: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            strip_www: true,
            strip_trailing_slash: true,
            percent_decode: true,
        }
    }
}

impl CoreConfig {
    /// Reject values that would misbehave at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.execution.default_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.default_concurrency",
                "0",
                "must be at least 1",
            ));
        }
        if self.execution.progress_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.progress_channel_capacity",
                "0",
                "must be at least 1",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "must be at least 1",
            ));
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.base_delay_ms",
                self.backoff.base_delay_ms.to_string(),
                format!(
                    "must not exceed backoff.max_delay_ms ({})",
                    self.backoff.max_delay_ms
                ),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                self.backoff.multiplier.to_string(),
                "must be at least 1.0",
            ));
        }
        Ok(())
    }
}
