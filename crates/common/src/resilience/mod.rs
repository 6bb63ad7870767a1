//! Resilience patterns for fault tolerance
//!
//! This module provides a **generic, reusable** retry executor. It is
//! generic over the error type and the operation, so the same code wraps
//! batch deliveries, Kerberos logins and ad-hoc queries.
//!
//! Retries are fixed-interval. Every wait is cancellable through a
//! [`tokio_util::sync::CancellationToken`].

pub mod retry;

// Re-export retry types
pub use retry::{
    policies, run_with_retry, RetryConfig, RetryDecision, RetryError, RetryExecutor,
    RetryOutcome, RetryPolicy, RetryResult,
};
