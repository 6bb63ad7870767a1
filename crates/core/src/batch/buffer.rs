//! Accumulate-then-flush buffer
//!
//! Not synchronized on its own; [`super::BatchProcessor`] wraps it in a
//! single mutex so the idle check, the swap and the timestamp update happen
//! as one step.

use std::mem;
use std::time::{Duration, Instant};

/// Upper bound on the capacity reserved after a flush, so a huge
/// `max_size` does not pin memory while the buffer is mostly empty.
const MAX_PREALLOCATED: usize = 4096;

/// Ordered records plus the size threshold and last-flush timestamp.
///
/// `max_size` is a trigger, not a cap: [`append`](Self::append) always
/// succeeds and reports whether the threshold has been reached.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    items: Vec<T>,
    max_size: usize,
    last_flushed_at: Instant,
}

impl<T> BatchBuffer<T> {
    pub fn new(max_size: usize) -> Self {
        Self::starting_at(max_size, Instant::now())
    }

    pub fn starting_at(max_size: usize, now: Instant) -> Self {
        let max_size = max_size.max(1);
        Self {
            items: Vec::with_capacity(max_size.min(MAX_PREALLOCATED)),
            max_size,
            last_flushed_at: now,
        }
    }

    /// Add a record; true when the post-append size reached `max_size`.
    pub fn append(&mut self, item: T) -> bool {
        self.items.push(item);
        self.is_full()
    }

    /// Detach the current contents, leaving an empty buffer in place, and
    /// stamp `now` as the last flush.
    pub fn snapshot_and_clear(&mut self, now: Instant) -> Vec<T> {
        self.last_flushed_at = now;
        let fresh = Vec::with_capacity(self.max_size.min(MAX_PREALLOCATED));
        mem::replace(&mut self.items, fresh)
    }

    /// `now - last_flushed_at`, zero if the clock went backwards.
    pub fn idle_duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_flushed_at)
    }

    /// Put undelivered records back ahead of anything appended since.
    pub fn requeue_front(&mut self, mut items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        items.append(&mut self.items);
        self.items = items;
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    pub const fn last_flushed_at(&self) -> Instant {
        self.last_flushed_at
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}
