use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

/// Configuration of a trade store instance.
///
/// All fields have defaults so a store can be opened with
/// `StoreConfig::default()`; TOML deserialization fills only the fields
/// present in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Seconds of write inactivity before a non-full queue is flushed.
    pub idle_time: f64,
    /// Seconds between metadata (`update-date`) refreshes.
    pub meta_data_time: f64,
    /// SQLite busy timeout in milliseconds; 0 means non-blocking.
    pub busy_timeout: u64,
    /// Queue length that triggers an immediate flush.
    pub threshold_bets: usize,
    /// Read-only mode: all mutation paths refuse, queries still work.
    pub read_only: bool,
    /// Enables verbose per-flush diagnostics; errors log regardless.
    pub use_log: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            idle_time: 15.0,
            meta_data_time: 1.0,
            busy_timeout: 0,
            threshold_bets: 1000,
            read_only: false,
            use_log: false,
        }
    }
}

impl StoreConfig {
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn idle_time(&self) -> Duration {
        Duration::from_secs_f64(self.idle_time.max(0.0))
    }

    pub fn meta_data_time(&self) -> Duration {
        Duration::from_secs_f64(self.meta_data_time.max(0.0))
    }
}

/// Configuration of a key-value or list store instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Log prefix identifying the instance.
    pub title: String,
    /// Table name; caller-renameable so several stores can share a file.
    pub table: String,
    /// SQLite busy timeout in milliseconds; 0 means non-blocking.
    pub busy_timeout: u64,
    pub read_only: bool,
    pub use_log: bool,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            title: "kv".to_string(),
            table: "Data".to_string(),
            busy_timeout: 0,
            read_only: false,
            use_log: false,
        }
    }
}

impl KvConfig {
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
