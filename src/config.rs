//! Pool configuration.

use serde::{Deserialize, Serialize};

/// Default number of worker threads: one per CPU.
fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Configuration for a simple [`ThreadManager`](crate::ThreadManager).
///
/// Applied by [`ThreadManager::from_config`](crate::ThreadManager::from_config):
/// `start` on the resulting manager installs the pending-task cap and spawns
/// the configured workers in one call.
///
/// # Example
///
/// ```
/// use threadmill::ManagerConfig;
///
/// let config = ManagerConfig::new()
///     .with_worker_count(4)
///     .with_pending_task_count_max(128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Number of worker threads spawned by `start`.
    ///
    /// Default: `num_cpus::get()`.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Pending-task cap; `0` leaves the queue unbounded.
    #[serde(default)]
    pub pending_task_count_max: usize,

    /// Detached disposition of the pool's thread factory.
    ///
    /// Joinable threads (the default here) are joined as workers are
    /// removed and at `stop`.
    #[serde(default)]
    pub detached: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            pending_task_count_max: 0,
            detached: false,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the pending-task cap (`0` = unbounded).
    #[must_use]
    pub fn with_pending_task_count_max(mut self, max: usize) -> Self {
        self.pending_task_count_max = max;
        self
    }

    /// Set the thread factory's detached disposition.
    #[must_use]
    pub fn with_detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.pending_task_count_max, 0);
        assert!(!config.detached);
    }

    #[test]
    fn test_builder_methods() {
        let config = ManagerConfig::new()
            .with_worker_count(8)
            .with_pending_task_count_max(64)
            .with_detached(true);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.pending_task_count_max, 64);
        assert!(config.detached);
    }

    #[test]
    fn test_zero_workers_invalid() {
        let config = ManagerConfig::new().with_worker_count(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_str() {
        let config =
            ManagerConfig::from_json_str(r#"{"worker_count": 2, "pending_task_count_max": 16}"#)
                .unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.pending_task_count_max, 16);
        assert!(!config.detached);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        assert!(ManagerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
        assert!(ManagerConfig::from_json_str("not json").is_err());
    }
}
