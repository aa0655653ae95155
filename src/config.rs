use crate::error::{Result, StatekitError};
use std::time::Duration;

/// Runtime tunables for persistence sync and command dispatch.
///
/// Defaults match the documented protocol parameters; every field can be
/// overridden from the environment via `from_env()`.
#[derive(Debug, Clone)]
pub struct StatekitConfig {
    /// Trailing-edge debounce window for leader writes (milliseconds).
    pub debounce_window_ms: u64,
    /// Maximum number of command items grouped into one batch.
    pub batch_max_items: usize,
    /// Maximum age of the oldest ungrouped item before a partial batch is flushed (milliseconds).
    pub batch_window_ms: u64,
    /// Number of retries after the initial dispatch attempt fails.
    pub retry_limit: u32,
    /// First retry delay; doubles on each subsequent retry (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound on any single retry delay (milliseconds).
    pub backoff_max_ms: u64,
    /// Capacity of broadcast channels used for storage change and batch outcome fan-out.
    pub channel_capacity: usize,
}

impl Default for StatekitConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 250,
            batch_max_items: 25,
            batch_window_ms: 5000,
            retry_limit: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 60000,
            channel_capacity: 1024,
        }
    }
}

impl StatekitConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(window) = std::env::var("STATEKIT_DEBOUNCE_WINDOW_MS") {
            config.debounce_window_ms = window.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid debounce_window_ms: {e}"))
            })?;
        }

        if let Ok(max_items) = std::env::var("STATEKIT_BATCH_MAX_ITEMS") {
            config.batch_max_items = max_items.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid batch_max_items: {e}"))
            })?;
        }

        if let Ok(window) = std::env::var("STATEKIT_BATCH_WINDOW_MS") {
            config.batch_window_ms = window.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid batch_window_ms: {e}"))
            })?;
        }

        if let Ok(retry_limit) = std::env::var("STATEKIT_RETRY_LIMIT") {
            config.retry_limit = retry_limit.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid retry_limit: {e}"))
            })?;
        }

        if let Ok(base) = std::env::var("STATEKIT_BACKOFF_BASE_MS") {
            config.backoff_base_ms = base.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid backoff_base_ms: {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("STATEKIT_BACKOFF_MAX_MS") {
            config.backoff_max_ms = max.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid backoff_max_ms: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("STATEKIT_CHANNEL_CAPACITY") {
            config.channel_capacity = capacity.parse().map_err(|e| {
                StatekitError::ConfigurationError(format!("Invalid channel_capacity: {e}"))
            })?;
        }

        Ok(config)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
