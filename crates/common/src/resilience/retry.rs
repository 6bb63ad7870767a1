//! Generic fixed-interval retry with cancellation
//!
//! The executor wraps any no-argument fallible async operation. It knows
//! nothing about what it retries (a batch delivery, a Kerberos login, a
//! query), only how often and how long to wait in between.
//!
//! Semantics, with `max_attempts = n`:
//! - success returns immediately, no sleep
//! - every retryable failure is followed by one sleep of `interval`
//! - after the failure that pushes the failure count past `n` (that is, the
//!   `n + 1`-th invocation), the sleep still happens and the last error is
//!   returned as [`RetryError::Exhausted`]
//! - `n = 0` retries until success or cancellation
//!
//! The loop is iterative and every wait, as well as the operation itself,
//! is raced against a [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { attempts: u32, source: E },

    /// The cancellation token fired before the operation succeeded
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last error the operation produced, if it ran at all
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
            Self::Cancelled { last, .. } => last,
        }
    }

    pub const fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
            Self::Cancelled { last, .. } => last.as_ref(),
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    /// Invocations of the operation
    pub attempts: u32,
    /// Time spent sleeping between attempts
    pub total_delay: Duration,
    pub started_at: Instant,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }

    /// Get the total elapsed time from first attempt to completion.
    pub fn total_elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries allowed after the first failure; 0 retries forever
    pub max_attempts: u32,
    /// Sleep after every failed attempt
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, interval: Duration::from_secs(5) }
    }
}

impl RetryConfig {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts, interval }
    }

    /// Retry until success or cancellation
    pub const fn forever(interval: Duration) -> Self {
        Self { max_attempts: 0, interval }
    }

    pub const fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// Total invocations before giving up, `None` when unbounded
    pub fn invocation_limit(&self) -> Option<u32> {
        (!self.is_unbounded()).then(|| self.max_attempts.saturating_add(1))
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation: F,
        cancel: &CancellationToken,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation, cancel).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_with_outcome<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started_at = Instant::now();
        let mut attempts: u32 = 0;
        let mut failures: u32 = 0;
        let mut total_delay = Duration::ZERO;
        let mut last: Option<E> = None;

        let finish = |result, attempts, total_delay| RetryOutcome {
            result,
            attempts,
            total_delay,
            started_at,
        };

        loop {
            if cancel.is_cancelled() {
                return finish(Err(RetryError::Cancelled { attempts, last }), attempts, total_delay);
            }

            attempts = attempts.saturating_add(1);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt = attempts, "operation aborted by cancellation");
                    return finish(
                        Err(RetryError::Cancelled { attempts, last }),
                        attempts,
                        total_delay,
                    );
                }
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if failures > 0 {
                        debug!(attempts, "operation succeeded after {} failures", failures);
                    }
                    return finish(Ok(value), attempts, total_delay);
                }
                Err(error) => error,
            };

            if self.policy.should_retry(&error, failures) == RetryDecision::Stop {
                debug!(attempt = attempts, error = %error, "retry policy declined to retry");
                return finish(
                    Err(RetryError::NonRetryable { attempts, source: error }),
                    attempts,
                    total_delay,
                );
            }

            failures = failures.saturating_add(1);
            let exhausted = !self.config.is_unbounded() && failures > self.config.max_attempts;

            if exhausted {
                warn!(attempt = attempts, error = %error, "operation failed, no attempts left");
            } else {
                warn!(
                    attempt = attempts,
                    error = %error,
                    "operation failed, retrying after {:?}",
                    self.config.interval
                );
            }

            let slept = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = tokio::time::sleep(self.config.interval) => true,
            };
            if !slept {
                return finish(
                    Err(RetryError::Cancelled { attempts, last: Some(error) }),
                    attempts,
                    total_delay,
                );
            }
            total_delay += self.config.interval;

            if exhausted {
                return finish(
                    Err(RetryError::Exhausted { attempts, source: error }),
                    attempts,
                    total_delay,
                );
            }
            last = Some(error);
        }
    }
}

/// Retry `operation` on every error, `max_attempts` times after the first
/// failure (0 = forever), sleeping `interval` after each failure.
pub async fn run_with_retry<F, Fut, T, E>(
    operation: F,
    max_attempts: u32,
    interval: Duration,
    cancel: &CancellationToken,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    RetryExecutor::new(RetryConfig::new(max_attempts, interval), policies::AlwaysRetry)
        .execute(operation, cancel)
        .await
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug, Clone, Copy)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
