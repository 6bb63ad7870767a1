//! Batch processing
//!
//! This module provides the accumulate-then-flush buffer, the sink port the
//! processor delivers through, and the processor itself.

pub mod buffer;
pub mod ports;
pub mod processor;

pub use buffer::BatchBuffer;
pub use ports::{BatchFailure, BatchSink, FailureAction};
pub use processor::{
    BatchError, BatchProcessor, FailureResolution, FlushOutcome, ProcessorConfig, ProcessorStats,
};
