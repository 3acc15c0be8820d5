//! Retry with exponential backoff and jitter.
//!
//! [`with_retry`] is the only retry loop in the crate. Every network-facing
//! call goes through it with a [`RetryPolicy`] and a predicate deciding which
//! errors are worth another attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::{IndexerError, IndexerResult};

/// Retry tuning for upstream calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay
    pub max_delay: Duration,
    /// Upper bound of the random jitter added on top
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries and never sleeps.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Deterministic part of the delay after the given failed attempt
    /// (0-based): `base_delay * 2^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Full delay after the given failed attempt, jitter included.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + random_jitter(self.max_jitter)
    }
}

/// Uniform random duration in `[0, max]`.
#[must_use]
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are exhausted. The last error is returned as-is.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn with_retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    context: &str,
    is_retryable: P,
    mut operation: F,
) -> IndexerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IndexerResult<T>>,
    P: Fn(&IndexerError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(context, attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    error!(context, attempts = attempt, error = %e, "Retries exhausted");
                    return Err(e);
                }

                let delay = policy.delay_for(attempt - 1);
                warn!(
                    context,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            ..RetryPolicy::no_retry()
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let max = Duration::from_millis(50);
        for _ in 0..100 {
            assert!(random_jitter(max) <= max);
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&instant_policy(5), "test", IndexerError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(IndexerError::rate_limited("Max rate limit reached"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: IndexerResult<()> =
            with_retry(&instant_policy(3), "test", IndexerError::is_retryable, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IndexerError::rate_limited("please try again later")) }
            })
            .await;

        assert!(matches!(result, Err(IndexerError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: IndexerResult<()> =
            with_retry(&instant_policy(5), "test", IndexerError::is_retryable, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IndexerError::storage("disk full", None)) }
            })
            .await;

        assert!(matches!(result, Err(IndexerError::StorageError { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
