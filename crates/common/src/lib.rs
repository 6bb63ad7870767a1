//! Common utilities shared across solrfeed crates.
//!
//! Currently this is the resilience layer: a generic, cancellable retry
//! executor used by the batch processor and the CLI login path.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types and traits for convenience
pub use resilience::{
    policies, run_with_retry, RetryConfig, RetryDecision, RetryError, RetryExecutor,
    RetryOutcome, RetryPolicy, RetryResult,
};
