//! Exponential backoff utilities for retry operations.

use crate::constants::{API_RETRY_ATTEMPTS, API_RETRY_DELAY_MS};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;

/// How often and how long to wait before retrying a failed call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry; later retries double it.
    pub base_delay: Duration,
    /// Number of retries after the initial attempt.
    pub attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(API_RETRY_DELAY_MS),
            attempts: API_RETRY_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// A policy that waits only a couple of milliseconds, for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            base_delay: Duration::from_millis(1),
            attempts: API_RETRY_ATTEMPTS,
        }
    }

    fn strategy(self) -> impl Iterator<Item = Duration> {
        // from_millis(2) doubles each step; factor scales it to base_delay
        let millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = (millis / 2).max(1);
        ExponentialBackoff::from_millis(2).factor(factor).take(self.attempts)
    }
}

/// Run `action`, retrying errors for which `is_retryable` returns true.
///
/// Non-retryable errors are returned immediately; retryable ones are retried
/// according to `policy` and the last error is returned if all attempts fail.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    operation: &str,
    policy: RetryPolicy,
    action: F,
    mut is_retryable: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
    E: Display,
{
    RetryIf::spawn(policy.strategy(), action, |err: &E| {
        let retry = is_retryable(err);
        if retry {
            tracing::warn!("{} failed, retrying: {}", operation, err);
        } else {
            tracing::debug!("{} failed with non-retryable error: {}", operation, err);
        }
        retry
    })
    .await
}
