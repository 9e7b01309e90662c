use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::types::Result;

/// Whole-item retry: up to `max_attempts` tries, sleeping `base^n` seconds
/// after the n-th failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_seconds: u64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_seconds: u64, max_attempts: u32) -> Self {
        Self {
            base_seconds,
            max_attempts: max_attempts.max(1),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_secs(self.base_seconds);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: self.base_seconds as f64,
            max_interval: Duration::from_secs(self.base_seconds.saturating_pow(self.max_attempts)),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.base_seconds.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }
            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };
            warn!(
                "Attempt {} of {} failed for {}, retrying in {:?}: {}",
                attempt, self.max_attempts, label, delay, err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn waits_base_power_attempt_between_tries() {
        let policy = RetryPolicy::new(5, 3);
        let calls = &AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run("event 1", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::TransientUpstream("503".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 5s after the first failure, 25s after the second, none after the last
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_return_immediately() {
        let policy = RetryPolicy::new(4, 3);
        let calls = &AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run("proposition 1", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::NotFound("proposition 1".into()))
            })
            .await;

        assert!(matches!(result, Err(SyncError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn delay_grows_as_a_power_of_the_base() {
        let policy = RetryPolicy::new(4, 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(4));
        assert_eq!(policy.delay_after(2), Duration::from_secs(16));
    }
}
