use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batching configuration for destination writes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of rows written to the destination in a single batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
}

impl BatchConfig {
    /// Default maximum number of rows per batch.
    pub const DEFAULT_MAX_SIZE: usize = 500;

    /// Validates batch configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

/// Retry behavior for batch rows that failed with a retryable error.
///
/// Delays grow exponentially from `initial_retry_delay_ms` by `backoff_multiplier` and are
/// capped at `max_retry_delay_ms`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total number of write attempts for a row, including the first one.
    ///
    /// Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    ///
    /// Default: 200ms
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,

    /// Upper bound for a single retry delay, in milliseconds.
    ///
    /// Default: 10000ms
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt. Must be >= 1.0.
    ///
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Returns the initial retry delay as a Duration.
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    /// Returns the maximum retry delay as a Duration.
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.retry.max_attempts".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.retry.backoff_multiplier".to_string(),
                constraint: "must be greater than or equal to 1.0".to_string(),
            });
        }

        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.retry.max_retry_delay_ms".to_string(),
                constraint: "must not be lower than `initial_retry_delay_ms`".to_string(),
            });
        }

        Ok(())
    }
}

/// Settings controlling how a computed delta is written to the destination.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ApplyConfig {
    /// Batching of destination writes.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Retry behavior for retryable row failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Maximum number of batches written concurrently.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: u16,
    /// Run-level timeout in milliseconds. Batches not yet started when it expires are skipped.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
    /// Stops dispatching new batches as soon as one row fails with a fatal error.
    #[serde(default)]
    pub abort_on_first_fatal: bool,
}

impl ApplyConfig {
    /// Default number of batches written concurrently.
    pub const DEFAULT_MAX_CONCURRENT_BATCHES: u16 = 4;

    /// Returns the run timeout as a Duration, if configured.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.batch.validate()?;
        self.retry.validate()?;

        if self.max_concurrent_batches == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.max_concurrent_batches".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.run_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "apply.run_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            max_concurrent_batches: default_max_concurrent_batches(),
            run_timeout_ms: None,
            abort_on_first_fatal: false,
        }
    }
}

fn default_max_concurrent_batches() -> u16 {
    ApplyConfig::DEFAULT_MAX_CONCURRENT_BATCHES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_apply_config_is_valid() {
        assert!(ApplyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = ApplyConfig {
            batch: BatchConfig { max_size: 0 },
            ..ApplyConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "apply.batch.max_size"
        ));
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let retry = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };

        assert!(retry.validate().is_err());
    }

    #[test]
    fn rejects_max_delay_below_initial_delay() {
        let retry = RetryConfig {
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 100,
            ..RetryConfig::default()
        };

        assert!(retry.validate().is_err());
    }
}
