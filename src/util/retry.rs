//! Bounded Retry with Exponential Backoff
//!
//! Wraps a fallible remote call, retrying only transient failures
//! (rate limits and server errors at the call sites). Each retry doubles the
//! delay; non-transient errors and exhausted budgets propagate immediately.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Marks which errors are worth retrying
pub trait Transient {
    /// True for rate-limit / server-error class failures
    fn is_transient(&self) -> bool;
}

/// Retry budget for one call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }
}

/// Run `op`, retrying transient errors within the policy's budget.
///
/// `name` labels the call site in logs.
pub async fn with_retry<T, E, F, Fut>(name: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("[{}] Succeeded after {} retries", name, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                debug!(
                    "[{}] {}. Retrying after {:?} ({}/{})",
                    name, e, delay, attempt, policy.max_retries
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient={})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry("test", fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { transient: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry("test", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { transient: true }) }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
