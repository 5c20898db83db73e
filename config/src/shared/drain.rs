use std::time::Duration;

use serde::Deserialize;

use crate::shared::ValidationError;

/// Timing of the wait for in-flight background jobs before an operation proceeds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DrainConfig {
    /// Time between two checks of the running jobs, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on the total wait, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl DrainConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 6_000;

    pub const DEFAULT_MAX_WAIT_MS: u64 = 60_000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Number of checks performed before giving up, `ceil(max_wait / poll_interval)`.
    pub fn max_iterations(&self) -> u64 {
        self.max_wait_ms.div_ceil(self.poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "drain.poll_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_wait_ms < self.poll_interval_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "drain.max_wait_ms".to_string(),
                constraint: "must be at least `drain.poll_interval_ms`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DrainConfig::DEFAULT_POLL_INTERVAL_MS
}

fn default_max_wait_ms() -> u64 {
    DrainConfig::DEFAULT_MAX_WAIT_MS
}
