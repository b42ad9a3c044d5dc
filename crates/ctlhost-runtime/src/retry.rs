//! Generic fixed-delay retry with cancellation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a retried operation ultimately failed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: E,
    },

    /// Cancellation was requested while waiting to retry.
    #[error("cancelled after {attempts} attempt(s): {last}")]
    Cancelled {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts that were made.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Retries an operation up to `max_retries` times after the first attempt,
/// sleeping `delay` in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` means a single attempt.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Runs `op` until it succeeds, the retries are used up, or `cancel`
    /// fires during a wait.
    ///
    /// The first attempt always runs, even when `cancel` has already fired.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] or [`RetryError::Cancelled`] with the
    /// last error observed.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt > self.max_retries {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            tracing::warn!(
                label,
                attempt,
                error = %err,
                delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying"
            );

            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt, last: err });
                }
            }
        }
    }
}
