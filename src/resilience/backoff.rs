//! Backoff schedule for anchor retries.

use rand::Rng;
use std::time::Duration;

use crate::config::AnchorRetryConfig;

/// Delay before retrying a failed anchor submission.
///
/// Attempt 0 retries immediately; each later attempt doubles the
/// configured base delay up to the cap, plus up to 10% jitter so
/// simultaneous retries spread out.
pub fn anchor_retry_delay(attempt: u32, retry: &AnchorRetryConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let doubled = retry
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = doubled.min(retry.max_delay_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(base_ms: u64, max_ms: u64) -> AnchorRetryConfig {
        AnchorRetryConfig {
            max_attempts: 3,
            base_delay_ms: base_ms,
            max_delay_ms: max_ms,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = retry(100, 1000);
        assert!(anchor_retry_delay(1, &config).as_millis() >= 100);
        assert!(anchor_retry_delay(2, &config).as_millis() >= 200);

        let capped = anchor_retry_delay(10, &config);
        assert!(capped.as_millis() >= 1000 && capped.as_millis() <= 1100);
    }

    #[test]
    fn test_first_attempt_retries_immediately() {
        assert_eq!(anchor_retry_delay(0, &retry(100, 1000)), Duration::ZERO);
    }
}
