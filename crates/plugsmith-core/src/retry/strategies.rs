//! Backoff delays and retry predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Delay before the attempt following `attempt` (1-indexed)
///
/// ```rust
/// use plugsmith_core::retry::calculate_delay;
/// use plugsmith_core::types::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 1000,
///     max_delay_ms: 30000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => policy.initial_delay_ms * (attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    // Up to 25% extra so parallel callers do not retry in lockstep
    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::rng().random_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error is worth another attempt
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// No error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// Errors that may carry an HTTP status code
pub trait HttpStatusError {
    fn status_code(&self) -> Option<u16>;
}

/// Retries transport failures and transient HTTP statuses
#[derive(Debug, Clone)]
pub struct HttpStatusPredicate {
    retryable_codes: Vec<u16>,
}

impl HttpStatusPredicate {
    /// 408, 425, 429, 500, 502, 503, 504
    pub fn default_http() -> Self {
        Self {
            retryable_codes: vec![408, 425, 429, 500, 502, 503, 504],
        }
    }

    pub fn is_retryable_code(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }
}

impl<E: HttpStatusError> RetryPredicate<E> for HttpStatusPredicate {
    fn should_retry(&self, error: &E) -> bool {
        // No status means the request never got a response
        error
            .status_code()
            .map(|code| self.is_retryable_code(code))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            strategy,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }

    #[test]
    fn test_strategies_without_jitter() {
        let none = policy(RetryStrategy::None);
        assert_eq!(calculate_delay(&none, 3, true), Duration::ZERO);

        let fixed = policy(RetryStrategy::FixedDelay);
        assert_eq!(calculate_delay(&fixed, 4, false), Duration::from_millis(1000));

        let linear = policy(RetryStrategy::LinearBackoff);
        assert_eq!(calculate_delay(&linear, 3, false), Duration::from_millis(3000));

        let exp = policy(RetryStrategy::ExponentialBackoff);
        assert_eq!(calculate_delay(&exp, 3, false), Duration::from_millis(4000));
        // capped at max_delay_ms
        assert_eq!(calculate_delay(&exp, 5, false), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let fixed = policy(RetryStrategy::FixedDelay);
        for _ in 0..50 {
            let delay = calculate_delay(&fixed, 1, true).as_millis();
            assert!((1000..=1250).contains(&delay));
        }
    }

    struct Status(Option<u16>);

    impl HttpStatusError for Status {
        fn status_code(&self) -> Option<u16> {
            self.0
        }
    }

    #[test]
    fn test_http_status_predicate() {
        let predicate = HttpStatusPredicate::default_http();
        assert!(predicate.should_retry(&Status(Some(503))));
        assert!(predicate.should_retry(&Status(Some(429))));
        assert!(predicate.should_retry(&Status(None)));
        assert!(!predicate.should_retry(&Status(Some(404))));
        assert!(!predicate.should_retry(&Status(Some(401))));
    }
}
