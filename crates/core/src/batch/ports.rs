//! Port interfaces for batch delivery
//!
//! The processor depends only on [`BatchSink`]; the Solr transport is one
//! implementation, tests provide in-memory ones.

use std::fmt;

use async_trait::async_trait;
use solrfeed_common::RetryError;
use tracing::error;

/// A snapshot whose delivery failed for good (retries exhausted or the
/// error was not retryable).
#[derive(Debug)]
pub struct BatchFailure<T, E> {
    pub records: Vec<T>,
    pub error: RetryError<E>,
}

impl<T, E> BatchFailure<T, E> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn attempts(&self) -> u32 {
        self.error.attempts()
    }
}

/// What the sink decided to do with a failed snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction<T> {
    /// Records are gone; the failure was logged
    Discard,
    /// Records go back to the front of the buffer
    Requeue(Vec<T>),
    /// Records were persisted somewhere else
    DeadLettered,
}

/// Capability the batch processor delivers through
#[async_trait]
pub trait BatchSink<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    type Error: fmt::Display + Send + Sync + 'static;

    /// Deliver one snapshot. Called again with the same slice on retry.
    async fn deliver(&self, batch: &[T]) -> Result<(), Self::Error>;

    /// Whether a failed delivery is worth another attempt
    fn is_retryable(&self, _error: &Self::Error) -> bool {
        true
    }

    /// Decide the fate of a snapshot that could not be delivered.
    ///
    /// The default logs the failure and drops the records.
    async fn handle_failure(&self, failure: BatchFailure<T, Self::Error>) -> FailureAction<T> {
        error!(
            records = failure.len(),
            attempts = failure.attempts(),
            error = %failure.error,
            "batch delivery failed, dropping records"
        );
        FailureAction::Discard
    }
}
