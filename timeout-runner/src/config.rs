//! Configuration for the timeout and queue runners.

use crate::errors::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by [`TimeoutTaskRunner`](crate::runner::TimeoutTaskRunner)
/// and [`QueueTaskRunner`](crate::dispatch::QueueTaskRunner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Period of the expiry scanner in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// How long `stop` waits for the dispatch worker before giving up.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Prefix for the names of the background threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_scan_interval_ms() -> u64 {
    1_000
}

fn default_shutdown_timeout_ms() -> u64 {
    100
}

fn default_thread_name() -> String {
    "timeout-runner".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl RunnerConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON, filling in defaults for missing fields.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RunnerError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the scan interval.
    #[must_use]
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval_ms = duration_to_millis(interval);
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Sets the thread name prefix.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Gets the scan interval as a Duration.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Gets the shutdown timeout as a Duration.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Checks the configuration for values the runners cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 {
            return Err(RunnerError::invalid_config(
                "scan_interval_ms must be greater than zero",
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(RunnerError::invalid_config("thread_name must not be empty"));
        }
        Ok(())
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
