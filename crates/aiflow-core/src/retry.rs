//! Bounded retry with exponential backoff
//!
//! Wraps a single fallible invocation. Transient failures are retried up to a
//! fixed bound with a growing delay; fatal failures propagate immediately.
//! The consumed attempt count is always reported so callers can surface it in
//! step traces even on final failure.

use crate::invoke::InvocationError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for model invocations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum invocation attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per subsequent attempt
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt bound and the default 1s delay
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Backoff before the attempt following `attempt` (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` under this policy.
    ///
    /// Returns the final outcome together with the number of attempts
    /// consumed. Transient errors are retried while attempts remain; fatal
    /// errors return immediately without consuming further attempts.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> (std::result::Result<T, InvocationError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, InvocationError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if err.transient && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient invocation failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
        }
    }

    /// Fails with a transient error until the call counter reaches
    /// `succeed_on`, then returns "ok".
    fn flaky(
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    ) -> impl FnMut() -> std::pin::Pin<
        Box<dyn Future<Output = std::result::Result<String, InvocationError>> + Send>,
    > {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= succeed_on {
                    Ok("ok".to_string())
                } else {
                    Err(InvocationError::transient("rate limited"))
                }
            })
        }
    }

    #[tokio::test]
    async fn first_attempt_success_consumes_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let (result, attempts) = fast_policy(3).run(flaky(calls, 1)).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let (result, attempts) = fast_policy(3).run(flaky(calls.clone(), 3)).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_report_the_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let (result, attempts) = fast_policy(3).run(flaky(calls.clone(), 99)).await;
        let err = result.unwrap_err();
        assert!(err.transient);
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_consume_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let (result, attempts) = fast_policy(3)
            .run(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<String, _>(InvocationError::fatal("invalid api key")) }
            })
            .await;
        assert!(!result.unwrap_err().transient);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
