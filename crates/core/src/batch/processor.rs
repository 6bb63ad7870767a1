//! Buffered batch processor
//!
//! Two entry points share one [`BatchBuffer`]:
//! - the append path, driven by a producer, flushes when the size threshold
//!   is reached
//! - the timer path ([`BatchProcessor::run_time_based`]) flushes when the
//!   buffer has been idle longer than `process_interval`
//!
//! Both take their snapshot under the same `parking_lot` mutex, which also
//! covers the idle check and the timestamp update, so a given record can
//! only ever land in one snapshot. Delivery happens after that lock is
//! released: producers keep appending to the fresh buffer while a slow
//! request is in flight. A separate async lock serializes deliveries so the
//! service never sees two flushes from the same processor at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use solrfeed_common::{policies::PredicateRetry, RetryConfig, RetryError, RetryExecutor};
use solrfeed_domain::BatchConfig;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::buffer::BatchBuffer;
use super::ports::{BatchFailure, BatchSink, FailureAction};

/// Processor errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Delivery was aborted by the cancellation signal; the snapshot went
    /// back into the buffer.
    #[error("batch delivery cancelled, {pending} records still buffered")]
    Cancelled { pending: usize },
}

/// Thresholds and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub max_size: usize,
    pub retry: RetryConfig,
    /// Run the idle-flush loop at all
    pub time_based: bool,
    /// Idle time after which the timer flushes
    pub process_interval: Duration,
    /// How often the timer wakes up to check
    pub wake_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for ProcessorConfig {
    fn from(cfg: &BatchConfig) -> Self {
        Self {
            max_size: cfg.max_size,
            retry: RetryConfig::new(cfg.max_retries, cfg.retry_interval()),
            time_based: cfg.time_based,
            process_interval: cfg.process_interval(),
            wake_interval: cfg.wake_interval(),
        }
    }
}

/// How a failed snapshot was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResolution {
    Discarded,
    Requeued,
    DeadLettered,
}

/// Result of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to do: the buffer was empty or not idle long enough
    Skipped,
    Delivered { records: usize, attempts: u32 },
    Failed { records: usize, attempts: u32, resolution: FailureResolution },
}

impl FlushOutcome {
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Point-in-time copy of the processor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub records_appended: u64,
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub batches_failed: u64,
    pub records_discarded: u64,
    pub records_requeued: u64,
    pub records_dead_lettered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    records_appended: AtomicU64,
    batches_delivered: AtomicU64,
    records_delivered: AtomicU64,
    batches_failed: AtomicU64,
    records_discarded: AtomicU64,
    records_requeued: AtomicU64,
    records_dead_lettered: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_discarded: self.records_discarded.load(Ordering::Relaxed),
            records_requeued: self.records_requeued.load(Ordering::Relaxed),
            records_dead_lettered: self.records_dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrates buffer, retry and sink
pub struct BatchProcessor<T, S> {
    buffer: Mutex<BatchBuffer<T>>,
    delivery: AsyncMutex<()>,
    sink: Arc<S>,
    config: ProcessorConfig,
    shutdown: CancellationToken,
    counters: Counters,
}

impl<T, S> BatchProcessor<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    pub fn new(sink: Arc<S>, config: ProcessorConfig) -> Self {
        Self::with_shutdown(sink, config, CancellationToken::new())
    }

    /// Build with an externally owned shutdown token; cancelling it aborts
    /// in-flight retries on the append and timer paths.
    pub fn with_shutdown(
        sink: Arc<S>,
        config: ProcessorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            buffer: Mutex::new(BatchBuffer::new(config.max_size)),
            delivery: AsyncMutex::new(()),
            sink,
            config,
            shutdown,
            counters: Counters::default(),
        }
    }

    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Records buffered and not yet snapshotted
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn stats(&self) -> ProcessorStats {
        self.counters.snapshot()
    }

    /// Append one record; flushes before returning when the threshold is
    /// reached.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no flush was triggered, otherwise the flush outcome.
    ///
    /// # Errors
    ///
    /// [`BatchError::Cancelled`] if the shutdown token fired during delivery.
    pub async fn append(&self, record: T) -> Result<Option<FlushOutcome>, BatchError> {
        let snapshot = {
            let mut buffer = self.buffer.lock();
            Counters::add(&self.counters.records_appended, 1);
            if buffer.append(record) {
                Some(buffer.snapshot_and_clear(Instant::now()))
            } else {
                None
            }
        };

        match snapshot {
            Some(batch) => {
                debug!(batch_size = batch.len(), "size threshold reached");
                self.deliver(batch, &self.shutdown).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Flush if the buffer has been idle longer than `process_interval`.
    ///
    /// An idle but empty buffer only has its clock reset.
    pub async fn flush_if_idle(&self) -> Result<FlushOutcome, BatchError> {
        let snapshot = {
            let mut buffer = self.buffer.lock();
            let now = Instant::now();
            if buffer.idle_duration(now) <= self.config.process_interval {
                return Ok(FlushOutcome::Skipped);
            }
            buffer.snapshot_and_clear(now)
        };

        if snapshot.is_empty() {
            return Ok(FlushOutcome::Skipped);
        }
        debug!(batch_size = snapshot.len(), "idle interval elapsed");
        self.deliver(snapshot, &self.shutdown).await
    }

    /// Flush whatever is buffered now.
    pub async fn flush(&self) -> Result<FlushOutcome, BatchError> {
        self.flush_with(&self.shutdown).await
    }

    /// Flush the remainder during graceful shutdown.
    ///
    /// Takes its own token because the processor's shutdown token is usually
    /// already cancelled by the time the owner drains.
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<FlushOutcome, BatchError> {
        let outcome = self.flush_with(cancel).await?;
        info!(stats = ?self.stats(), "batch processor drained");
        Ok(outcome)
    }

    async fn flush_with(&self, cancel: &CancellationToken) -> Result<FlushOutcome, BatchError> {
        let snapshot = self.buffer.lock().snapshot_and_clear(Instant::now());
        if snapshot.is_empty() {
            return Ok(FlushOutcome::Skipped);
        }
        self.deliver(snapshot, cancel).await
    }

    /// Timer path: wake every `wake_interval`, flush when idle, until
    /// `cancel` fires. Returns immediately when time-based processing is off.
    #[instrument(skip_all, fields(process_interval = ?self.config.process_interval))]
    pub async fn run_time_based(&self, cancel: CancellationToken) {
        if !self.config.time_based {
            debug!("time-based processing disabled");
            return;
        }
        info!("time-based flush loop started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.wake_interval) => {}
            }

            match self.flush_if_idle().await {
                Ok(FlushOutcome::Skipped) => {}
                Ok(outcome) => debug!(?outcome, "timer flush finished"),
                Err(err) => warn!(error = %err, "timer flush interrupted"),
            }
        }

        info!("time-based flush loop stopped");
    }

    async fn deliver(
        &self,
        batch: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<FlushOutcome, BatchError> {
        let _serial = self.delivery.lock().await;

        let sink = self.sink.as_ref();
        let records = batch.len();
        let policy = PredicateRetry::new(|err: &S::Error, _| sink.is_retryable(err));
        let executor = RetryExecutor::new(self.config.retry, policy);

        let outcome = {
            let slice = batch.as_slice();
            executor.execute_with_outcome(move || sink.deliver(slice), cancel).await
        };
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(()) => {
                self.counters.batches_delivered.fetch_add(1, Ordering::Relaxed);
                Counters::add(&self.counters.records_delivered, records);
                debug!(batch_size = records, attempts, "batch delivered");
                Ok(FlushOutcome::Delivered { records, attempts })
            }
            Err(RetryError::Cancelled { .. }) => {
                let pending = {
                    let mut buffer = self.buffer.lock();
                    buffer.requeue_front(batch);
                    buffer.len()
                };
                warn!(batch_size = records, pending, "delivery cancelled, records kept in buffer");
                Err(BatchError::Cancelled { pending })
            }
            Err(error) => {
                self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                let failure = BatchFailure { records: batch, error };
                let resolution = match sink.handle_failure(failure).await {
                    FailureAction::Discard => {
                        Counters::add(&self.counters.records_discarded, records);
                        FailureResolution::Discarded
                    }
                    FailureAction::Requeue(items) => {
                        Counters::add(&self.counters.records_requeued, items.len());
                        self.buffer.lock().requeue_front(items);
                        FailureResolution::Requeued
                    }
                    FailureAction::DeadLettered => {
                        Counters::add(&self.counters.records_dead_lettered, records);
                        FailureResolution::DeadLettered
                    }
                };
                Ok(FlushOutcome::Failed { records, attempts, resolution })
            }
        }
    }
}

impl<T, S> Drop for BatchProcessor<T, S> {
    fn drop(&mut self) {
        let pending = self.buffer.get_mut().len();
        if pending > 0 {
            warn!(pending, "batch processor dropped with undelivered records");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the batch processor
    //!
    //! Tests cover the size trigger, the idle trigger, failure hooks,
    //! cancellation during delivery, and concurrent producer/timer access.

    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    /// Records every delivered snapshot; fails the first `fail_first` calls.
    #[derive(Default)]
    struct RecordingSink {
        delivered: TokioMutex<Vec<Vec<u32>>>,
        calls: AtomicU32,
        fail_first: u32,
        action: Option<fn(Vec<u32>) -> FailureAction<u32>>,
        failures: TokioMutex<Vec<Vec<u32>>>,
    }

    impl RecordingSink {
        fn failing(fail_first: u32) -> Self {
            Self { fail_first, ..Self::default() }
        }

        async fn snapshots(&self) -> Vec<Vec<u32>> {
            self.delivered.lock().await.clone()
        }
    }

    #[async_trait]
    impl BatchSink<u32> for RecordingSink {
        type Error = String;

        async fn deliver(&self, batch: &[u32]) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(format!("unavailable ({call})"));
            }
            self.delivered.lock().await.push(batch.to_vec());
            Ok(())
        }

        async fn handle_failure(&self, failure: BatchFailure<u32, String>) -> FailureAction<u32> {
            self.failures.lock().await.push(failure.records.clone());
            match self.action {
                Some(decide) => decide(failure.records),
                None => FailureAction::Discard,
            }
        }
    }

    fn config(max_size: usize, max_retries: u32) -> ProcessorConfig {
        ProcessorConfig {
            max_size,
            retry: RetryConfig::new(max_retries, Duration::ZERO),
            time_based: false,
            process_interval: Duration::from_secs(3600),
            wake_interval: Duration::from_millis(5),
        }
    }

    /// Validates the size trigger end to end.
    ///
    /// Assertions:
    /// - Second append delivers exactly `[1, 2]`.
    /// - Buffer is empty afterwards.
    /// - Third append does not flush and stays buffered.
    #[tokio::test]
    async fn test_threshold_flush_delivers_exact_snapshot() {
        let sink = Arc::new(RecordingSink::default());
        let processor = BatchProcessor::new(sink.clone(), config(2, 0));

        assert_eq!(processor.append(1).await.unwrap(), None);
        let outcome = processor.append(2).await.unwrap();
        assert_eq!(outcome, Some(FlushOutcome::Delivered { records: 2, attempts: 1 }));
        assert_eq!(sink.snapshots().await, vec![vec![1, 2]]);
        assert_eq!(processor.pending(), 0);

        assert_eq!(processor.append(3).await.unwrap(), None);
        assert_eq!(processor.pending(), 1);
        assert_eq!(sink.snapshots().await.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_count_is_floor_of_n_over_m() {
        let sink = Arc::new(RecordingSink::default());
        let processor = BatchProcessor::new(sink.clone(), config(3, 0));

        let mut flushes = 0;
        for i in 0..10 {
            if processor.append(i).await.unwrap().is_some() {
                flushes += 1;
            }
        }

        assert_eq!(flushes, 3);
        assert_eq!(processor.pending(), 1);
        let snapshots = sink.snapshots().await;
        assert_eq!(snapshots, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_with_same_snapshot() {
        let sink = Arc::new(RecordingSink::failing(2));
        let processor = BatchProcessor::new(sink.clone(), config(2, 3));

        processor.append(7).await.unwrap();
        let outcome = processor.append(8).await.unwrap();

        assert_eq!(outcome, Some(FlushOutcome::Delivered { records: 2, attempts: 3 }));
        assert_eq!(sink.snapshots().await, vec![vec![7, 8]]);
        assert!(sink.failures.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_invoke_hook_and_discard_by_default() {
        let sink = Arc::new(RecordingSink::failing(u32::MAX));
        let processor = BatchProcessor::new(sink.clone(), config(1, 1));

        let outcome = processor.append(5).await.unwrap();

        assert_eq!(
            outcome,
            Some(FlushOutcome::Failed {
                records: 1,
                attempts: 2,
                resolution: FailureResolution::Discarded
            })
        );
        assert_eq!(*sink.failures.lock().await, vec![vec![5]]);
        assert_eq!(processor.pending(), 0);
        let stats = processor.stats();
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.records_discarded, 1);
    }

    #[tokio::test]
    async fn test_requeue_action_puts_records_back() {
        let sink = Arc::new(RecordingSink {
            fail_first: 2,
            action: Some(FailureAction::Requeue),
            ..RecordingSink::default()
        });
        let processor = BatchProcessor::new(sink.clone(), config(2, 1));

        processor.append(1).await.unwrap();
        let outcome = processor.append(2).await.unwrap();
        assert!(matches!(
            outcome,
            Some(FlushOutcome::Failed { resolution: FailureResolution::Requeued, .. })
        ));
        assert_eq!(processor.pending(), 2);

        // Third call to the sink succeeds; requeued records go first
        let outcome = processor.append(3).await.unwrap();
        assert!(outcome.unwrap().is_delivered());
        assert_eq!(sink.snapshots().await, vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_cancellation_requeues_snapshot() {
        let sink = Arc::new(RecordingSink::failing(u32::MAX));
        let shutdown = CancellationToken::new();
        let mut cfg = config(2, 0);
        cfg.retry = RetryConfig::forever(Duration::from_millis(5));
        let processor =
            Arc::new(BatchProcessor::with_shutdown(sink.clone(), cfg, shutdown.clone()));

        processor.append(1).await.unwrap();
        let p = processor.clone();
        let handle = tokio::spawn(async move { p.append(2).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        let result = handle.await.unwrap();
        assert_eq!(result, Err(BatchError::Cancelled { pending: 2 }));
        assert_eq!(processor.pending(), 2);
        assert!(sink.failures.lock().await.is_empty(), "cancellation is not a failure");
    }

    #[tokio::test]
    async fn test_drain_flushes_remainder_with_its_own_token() {
        let sink = Arc::new(RecordingSink::default());
        let shutdown = CancellationToken::new();
        let processor =
            BatchProcessor::with_shutdown(sink.clone(), config(10, 0), shutdown.clone());

        processor.append(1).await.unwrap();
        processor.append(2).await.unwrap();
        shutdown.cancel();

        let outcome = processor.drain(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Delivered { records: 2, attempts: 1 });
        assert_eq!(processor.pending(), 0);

        // Nothing left: a second drain is a no-op
        let outcome = processor.drain(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_idle_flush_skips_empty_buffer_and_fresh_buffer() {
        let sink = Arc::new(RecordingSink::default());
        let mut cfg = config(100, 0);
        cfg.process_interval = Duration::ZERO;
        let processor = BatchProcessor::new(sink.clone(), cfg);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(processor.flush_if_idle().await.unwrap(), FlushOutcome::Skipped);
        assert!(sink.snapshots().await.is_empty());

        processor.append(9).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let outcome = processor.flush_if_idle().await.unwrap();
        assert_eq!(outcome, FlushOutcome::Delivered { records: 1, attempts: 1 });

        let mut cfg = config(100, 0);
        cfg.process_interval = Duration::from_secs(3600);
        let patient = BatchProcessor::new(sink.clone(), cfg);
        patient.append(10).await.unwrap();
        assert_eq!(patient.flush_if_idle().await.unwrap(), FlushOutcome::Skipped);
        assert_eq!(patient.pending(), 1);
    }

    #[tokio::test]
    async fn test_time_based_loop_disabled_returns_immediately() {
        let processor = BatchProcessor::new(Arc::new(RecordingSink::default()), config(5, 0));
        let run = processor.run_time_based(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(1), run).await.unwrap();
    }

    /// Validates mutual exclusion between producer and timer.
    ///
    /// Assertions:
    /// - No snapshot is empty.
    /// - Every snapshot is a contiguous run of appended values.
    /// - Together the snapshots cover every record exactly once.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_timer_and_producer_never_overlap() {
        const TOTAL: u32 = 2_000;

        let sink = Arc::new(RecordingSink::default());
        let mut cfg = config(37, 0);
        cfg.time_based = true;
        cfg.process_interval = Duration::ZERO;
        cfg.wake_interval = Duration::from_millis(1);
        let processor = Arc::new(BatchProcessor::new(sink.clone(), cfg));

        let cancel = CancellationToken::new();
        let timer = {
            let p = processor.clone();
            let c = cancel.clone();
            tokio::spawn(async move { p.run_time_based(c).await })
        };

        for i in 0..TOTAL {
            processor.append(i).await.unwrap();
            if i % 50 == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        cancel.cancel();
        timer.await.unwrap();
        processor.drain(&CancellationToken::new()).await.unwrap();

        let mut snapshots = sink.snapshots().await;
        assert!(snapshots.iter().all(|s| !s.is_empty()));
        for snapshot in &snapshots {
            assert!(snapshot.windows(2).all(|w| w[1] == w[0] + 1), "non-contiguous {snapshot:?}");
        }
        snapshots.sort_by_key(|s| s[0]);
        let flattened: Vec<u32> = snapshots.into_iter().flatten().collect();
        assert_eq!(flattened, (0..TOTAL).collect::<Vec<_>>());
        assert_eq!(processor.stats().records_delivered, u64::from(TOTAL));
    }
}
