//! Background idle-flush scheduler
//!
//! Owns the task that drives [`BatchProcessor::run_time_based`] with
//! explicit start/stop and a join handle.

use std::sync::Arc;
use std::time::Duration;

use solrfeed_core::{BatchProcessor, BatchSink};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// How long `stop` waits for an in-progress flush
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FlushScheduler<T, S> {
    processor: Arc<BatchProcessor<T, S>>,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl<T, S> FlushScheduler<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T> + 'static,
{
    pub fn new(processor: Arc<BatchProcessor<T, S>>) -> Self {
        Self {
            processor,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawn the timer loop.
    ///
    /// The loop also ends when the processor's shutdown token is cancelled.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRunning`] if the loop is live.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the scheduler can restart after stop
        self.cancellation_token = self.processor.shutdown_token().child_token();

        let processor = Arc::clone(&self.processor);
        let cancel = self.cancellation_token.clone();
        self.task_handle = Some(tokio::spawn(async move {
            processor.run_time_based(cancel).await;
        }));

        info!("flush scheduler started");
        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotRunning`] if never started or already stopped,
    /// [`SchedulerError::Timeout`] if the loop did not exit in time.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation_token.cancel();

        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {
                info!("flush scheduler stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "flush task failed");
                Err(SchedulerError::TaskJoinFailed(e.to_string()))
            }
            Err(_) => {
                warn!("flush task did not complete within timeout");
                Err(SchedulerError::Timeout { seconds: STOP_TIMEOUT.as_secs() })
            }
        }
    }

    /// True while the background task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<T, S> Drop for FlushScheduler<T, S> {
    fn drop(&mut self) {
        if self.task_handle.is_some() && !self.cancellation_token.is_cancelled() {
            warn!("FlushScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
