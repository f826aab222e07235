//! Bounded retry with fixed backoff for flaky transport steps.
//!
//! Only errors that report themselves as [`Transient`] are retried. Each
//! attempt runs under its own timeout; an elapsed attempt is converted into the
//! operation's error type through `From<Elapsed>` and counts as a failure like
//! any other.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::error::Elapsed;
use tracing::{debug, warn};

/// Classifies an error as worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// How many times to try, how long each try may take and how long to wait in
/// between. Backoff is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(10),
            backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not worth retrying.
    #[error("permanent failure: {0}")]
    Permanent(E),

    /// Every permitted attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Progress of one [`RetryPolicy::run`] call.
#[derive(Debug)]
pub struct RetryState<E> {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<E>,
}

impl<E> RetryState<E> {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_error: None,
        }
    }

    fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. A `max_attempts` of zero is
    /// treated as one.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + From<Elapsed> + Display,
    {
        let mut state = RetryState::new(self.max_attempts.max(1));

        loop {
            state.attempt += 1;
            let outcome = match tokio::time::timeout(self.per_attempt_timeout, op(state.attempt)).await {
                Ok(result) => result,
                Err(elapsed) => Err(E::from(elapsed)),
            };

            let error = match outcome {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!(operation, attempt = state.attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                warn!(operation, attempt = state.attempt, error = %error, "Permanent failure");
                return Err(RetryError::Permanent(error));
            }

            if state.is_last() {
                warn!(
                    operation,
                    attempts = state.attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    last_error: error,
                });
            }

            debug!(
                operation,
                attempt = state.attempt,
                max_attempts = state.max_attempts,
                error = %error,
                backoff_ms = self.backoff.as_millis() as u64,
                "Transient failure, retrying"
            );
            state.last_error = Some(error);
            tokio::time::sleep(self.backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Error, PartialEq)]
    enum FlakyError {
        #[error("busy")]
        Busy,
        #[error("rejected")]
        Rejected,
        #[error("timed out")]
        TimedOut,
    }

    impl Transient for FlakyError {
        fn is_transient(&self) -> bool {
            !matches!(self, FlakyError::Rejected)
        }
    }

    impl From<Elapsed> for FlakyError {
        fn from(_: Elapsed) -> Self {
            FlakyError::TimedOut
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(1),
            backoff: Duration::from_millis(250),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = policy()
            .run("flaky", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError::Busy)
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last_error: FlakyError::Busy
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs between three attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy()
            .run("flaky", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError::Rejected)
            })
            .await;

        assert!(matches!(result, Err(RetryError::Permanent(FlakyError::Rejected))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_transient() {
        let result = policy()
            .run("flaky", |attempt| async move {
                if attempt < 3 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, FlakyError>(attempt)
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..policy()
        };
        let result: Result<(), _> = policy.run("flaky", |_| async { Err(FlakyError::Busy) }).await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
        assert_eq!(err.into_inner(), FlakyError::Busy);
    }
}
