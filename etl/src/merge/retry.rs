use std::time::Duration;

use config::shared::RetryConfig;
use rand::Rng;

/// Upper bound of the random jitter added to each delay, as a fraction of the delay.
const MAX_JITTER_FACTOR: f64 = 0.3;

/// Delay before retry number `attempt` (1 for the first retry).
///
/// Grows as `initial * multiplier^(attempt - 1)`, is capped at the configured maximum and then
/// stretched by up to 30% of random jitter so concurrent batches do not retry in lockstep.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base_delay_ms = base_delay_ms(config, attempt);
    let jitter_factor = rand::thread_rng().gen_range(0.0..=MAX_JITTER_FACTOR);

    Duration::from_millis((base_delay_ms * (1.0 + jitter_factor)) as u64)
}

fn base_delay_ms(config: &RetryConfig, attempt: u32) -> f64 {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let delay_ms = config.initial_retry_delay_ms as f64 * config.backoff_multiplier.powi(exponent);

    delay_ms.min(config.max_retry_delay_ms as f64)
}
