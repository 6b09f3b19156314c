//! Configuration for the batch controller
//!
//! Values come from `Default`, optional `with_*` overrides and, for the
//! binary, `OUTBOX_*` environment variables.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};
use crate::store::FileStoreConfig;

/// Environment variable names read by `BatchConfig::from_env`
pub const ENV_SIZE_THRESHOLD: &str = "OUTBOX_SIZE_THRESHOLD";
pub const ENV_TIME_INTERVAL_MS: &str = "OUTBOX_TIME_INTERVAL_MS";
pub const ENV_TICK_INTERVAL_MS: &str = "OUTBOX_TICK_INTERVAL_MS";
pub const ENV_DATA_DIR: &str = "OUTBOX_DATA_DIR";

/// Configuration for a `BatchManager`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Pending count at which the size strategy fires
    pub size_threshold: usize,
    /// Time since the last flush after which the time strategy fires
    pub time_interval: Duration,
    /// How often the controller re-evaluates strategies on its own
    pub tick_interval: Duration,
    /// Bound of the controller's command queue
    pub channel_capacity: usize,
    /// Buffer of the flush report broadcast channel
    pub report_capacity: usize,
    /// Directory holding the file store
    pub data_dir: PathBuf,
    /// Dead log lines tolerated before the file store compacts
    pub compact_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size_threshold: 50,
            time_interval: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            channel_capacity: 1024,
            report_capacity: 64,
            data_dir: PathBuf::from("data"),
            compact_threshold: 1000,
        }
    }
}

impl BatchConfig {
    /// Create config with the two batching knobs
    pub fn new(size_threshold: usize, time_interval: Duration) -> Self {
        Self {
            size_threshold,
            time_interval,
            ..Default::default()
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Load defaults overridden by `OUTBOX_*` environment variables
    pub fn from_env() -> BatchResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load defaults overridden by values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> BatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_SIZE_THRESHOLD) {
            config.size_threshold = parse_number(ENV_SIZE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_TIME_INTERVAL_MS) {
            let millis = parse_number(ENV_TIME_INTERVAL_MS, &value)?;
            config.time_interval = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_TICK_INTERVAL_MS) {
            let millis = parse_number(ENV_TICK_INTERVAL_MS, &value)?;
            config.tick_interval = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> BatchResult<()> {
        if self.size_threshold == 0 {
            return Err(BatchError::Config("size threshold must be at least 1".to_string()));
        }
        if self.time_interval.is_zero() {
            return Err(BatchError::Config("time interval must be non-zero".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(BatchError::Config("tick interval must be non-zero".to_string()));
        }
        if self.channel_capacity == 0 || self.report_capacity == 0 {
            return Err(BatchError::Config("channel capacities must be non-zero".to_string()));
        }
        Ok(())
    }

    /// File store settings derived from this config
    pub fn file_store_config(&self) -> FileStoreConfig {
        FileStoreConfig::new(&self.data_dir).with_compact_threshold(self.compact_threshold)
    }
}

/// Parse into the target width directly so out-of-range values are
/// rejected rather than truncated
fn parse_number<T>(key: &str, value: &str) -> BatchResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| BatchError::Config(format!("{}={:?}: {}", key, value, e)))
}
