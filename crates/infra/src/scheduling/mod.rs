//! Background scheduling
//!
//! Lifecycle rules: explicit start/stop, join handles for spawned tasks,
//! cancellation tokens, and a timeout around every join.

pub mod error;
pub mod flush_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use flush_scheduler::FlushScheduler;
