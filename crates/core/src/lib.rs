//! # solrfeed Core
//!
//! Batch processing logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The [`BatchBuffer`] and the [`BatchProcessor`] that drives it
//! - The [`BatchSink`] port deliveries go through
//!
//! ## Architecture Principles
//! - Only depends on `solrfeed-common` and `solrfeed-domain`
//! - No HTTP or filesystem code
//! - Generic over the record type; all delivery via the sink trait

pub mod batch;

pub use batch::{
    BatchBuffer, BatchError, BatchFailure, BatchProcessor, BatchSink, FailureAction,
    FailureResolution, FlushOutcome, ProcessorConfig, ProcessorStats,
};
