//! Queue configuration.

use adjourn_core::{QueueError, QueueResult};
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for scheduling and worker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum spacing between runs of paced jobs, in seconds (0 = no pacing).
    #[serde(default)]
    pub min_spacing_secs: u64,

    /// Attempts after which a job is treated as permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Worker polling interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Age in seconds after which a held lock is treated as abandoned.
    #[serde(default = "default_lock_staleness")]
    pub lock_staleness_secs: u64,

    /// Number of due candidates fetched per claim round.
    #[serde(default = "default_claim_batch")]
    pub claim_batch: usize,

    /// Lowest priority value this worker accepts, inclusive.
    #[serde(default)]
    pub min_priority: Option<i32>,

    /// Highest priority value this worker accepts, inclusive.
    #[serde(default)]
    pub max_priority: Option<i32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_spacing_secs: 0,
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval(),
            lock_staleness_secs: default_lock_staleness(),
            claim_batch: default_claim_batch(),
            min_priority: None,
            max_priority: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    25
}

fn default_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_lock_staleness() -> u64 {
    14400 // 4 hours
}

fn default_claim_batch() -> usize {
    5
}

impl QueueConfig {
    /// Loads configuration from `ADJOURN_`-prefixed environment variables.
    ///
    /// Nested keys use `__` as the separator, for example
    /// `ADJOURN_MAX_ATTEMPTS=10`.
    pub fn from_env() -> QueueResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ADJOURN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error_to_queue_error)?;

        let queue_config: Self = config
            .try_deserialize()
            .map_err(config_error_to_queue_error)?;

        queue_config.validate()?;
        Ok(queue_config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> QueueResult<()> {
        if self.max_attempts == 0 {
            return Err(QueueError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.claim_batch == 0 {
            return Err(QueueError::Configuration(
                "claim_batch must be at least 1".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(QueueError::Configuration(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }

        if let (Some(min), Some(max)) = (self.min_priority, self.max_priority) {
            if min > max {
                return Err(QueueError::Configuration(format!(
                    "min_priority {} exceeds max_priority {}",
                    min, max
                )));
            }
        }

        Ok(())
    }

    /// Returns the pacing window as a chrono duration.
    pub fn min_spacing(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_spacing_secs as i64)
    }

    /// Returns the poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the lock staleness threshold as a chrono duration.
    pub fn lock_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_staleness_secs as i64)
    }
}

fn config_error_to_queue_error(err: ConfigError) -> QueueError {
    QueueError::Configuration(err.to_string())
}
