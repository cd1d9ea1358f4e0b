//! Retry-with-backoff around external model calls.
//!
//! Model APIs rate-limit and fail transiently under concurrent load; every
//! call in this crate runs through [`retry`] so the policy lives in exactly
//! one place. The delay doubles per attempt from `base_delay` up to
//! `max_delay`, which keeps concurrent workers from retrying in lockstep
//! against a recovering endpoint.

use crate::config::ConversionConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff parameters shared by every external call in a run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on the delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &ConversionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// Delay after `completed_attempts` failed attempts: base × 2^(n−1),
    /// capped at `max_delay`.
    fn delay_for(&self, completed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(completed_attempts.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Drive `op` until it succeeds, retries are exhausted, or a non-retryable
/// error occurs. On failure returns the attempt count alongside the last
/// error so callers can report both.
pub(crate) async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, (u32, E)>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err((attempt, err));
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "model call failed; retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(3), Duration::from_secs(10));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_the_final_attempt() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);
        let result = retry(&policy, |_: &&str| true, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_the_attempt_count() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry(&policy, |_: &&str| true, || {
            calls.set(calls.get() + 1);
            async { Err("still failing") }
        })
        .await;
        let (attempts, err) = result.unwrap_err();
        assert_eq!(attempts, 3);
        assert_eq!(err, "still failing");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_fail_fast() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry(&policy, |_: &&str| false, || {
            calls.set(calls.get() + 1);
            async { Err("bad request") }
        })
        .await;
        let (attempts, _) = result.unwrap_err();
        assert_eq!(attempts, 1);
        assert_eq!(calls.get(), 1);
    }
}
