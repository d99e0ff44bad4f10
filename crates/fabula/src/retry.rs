//! Retry policy for collaborator calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// How many times and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Whether the delay doubles per retry.
    pub exponential: bool,
}

impl RetryPolicy {
    /// Fixed backoff with `max_retries` retries.
    #[must_use]
    pub fn fixed(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff: backoff,
            exponential: false,
        }
    }

    /// Exponential backoff starting at 500ms with `max_retries` retries.
    #[must_use]
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(500),
            exponential: true,
        }
    }

    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        if self.exponential {
            self.initial_backoff * 2u32.saturating_pow(retry)
        } else {
            self.initial_backoff
        }
    }
}

impl Default for RetryPolicy {
    /// One retry with 500ms backoff, the engine-wide default for
    /// collaborator calls.
    fn default() -> Self {
        Self::fixed(1, Duration::from_millis(500))
    }
}

/// Run `operation`, retrying per `policy` while the error is retryable.
///
/// Permanent errors return immediately. An operation that stays retryable
/// through every attempt surfaces as [`Error::ServiceUnavailable`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) if err.is_retryable() => {
                return Err(Error::ServiceUnavailable(err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_first_try() {
        let result: Result<i32> =
            with_retry(&RetryPolicy::none(), || async { Ok(7) }).await;
        assert_eq!(result.expect("ok"), 7);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(1, Duration::ZERO);
        let result = with_retry(&policy, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::service("flaky"))
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.expect("ok"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_unavailable() {
        let policy = RetryPolicy::fixed(1, Duration::ZERO);
        let result: Result<()> =
            with_retry(&policy, || async { Err(Error::service("still down")) }).await;
        assert!(matches!(result, Err(Error::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<()> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::InvalidRequest("bad body".to_string()))
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
