//! [`BatchSink`] that delivers record batches to Solr

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use solrfeed_core::{BatchFailure, BatchSink, FailureAction};
use solrfeed_domain::{BatchConfig, FailurePolicy, FeedError, Record};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use super::client::SolrClient;

/// Solr `update` delivery plus the configured failure policy
#[derive(Debug)]
pub struct SolrBatchSink {
    client: Arc<SolrClient>,
    commit: bool,
    on_failure: FailurePolicy,
    dead_letter_path: PathBuf,
}

impl SolrBatchSink {
    pub fn new(client: Arc<SolrClient>, batch: &BatchConfig) -> Self {
        Self {
            client,
            commit: batch.commit,
            on_failure: batch.on_failure,
            dead_letter_path: batch.dead_letter_path.clone(),
        }
    }

    pub fn client(&self) -> &Arc<SolrClient> {
        &self.client
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.on_failure
    }
}

#[async_trait]
impl BatchSink<Record> for SolrBatchSink {
    type Error = FeedError;

    async fn deliver(&self, batch: &[Record]) -> Result<(), FeedError> {
        self.client.update(batch, self.commit).await.map(|_| ())
    }

    fn is_retryable(&self, error: &FeedError) -> bool {
        error.is_retryable()
    }

    async fn handle_failure(
        &self,
        failure: BatchFailure<Record, FeedError>,
    ) -> FailureAction<Record> {
        let records = failure.len();
        let attempts = failure.attempts();
        let category = failure.error.last_error().map_or("unknown", |e| e.category().as_str());

        match self.on_failure {
            FailurePolicy::Drop => {
                error!(
                    records,
                    attempts,
                    category,
                    error = %failure.error,
                    "batch delivery failed, dropping records"
                );
                FailureAction::Discard
            }
            FailurePolicy::Requeue => {
                warn!(
                    records,
                    attempts,
                    category,
                    error = %failure.error,
                    "batch delivery failed, requeueing records"
                );
                FailureAction::Requeue(failure.records)
            }
            FailurePolicy::DeadLetter => {
                match append_dead_letters(&self.dead_letter_path, &failure.records).await {
                    Ok(()) => {
                        warn!(
                            records,
                            attempts,
                            category,
                            path = %self.dead_letter_path.display(),
                            error = %failure.error,
                            "batch delivery failed, records dead-lettered"
                        );
                        FailureAction::DeadLettered
                    }
                    Err(err) => {
                        error!(
                            records,
                            path = %self.dead_letter_path.display(),
                            error = %err,
                            delivery_error = %failure.error,
                            "dead-letter write failed, dropping records"
                        );
                        FailureAction::Discard
                    }
                }
            }
        }
    }
}

/// Append each record as one JSON line.
async fn append_dead_letters(path: &Path, records: &[Record]) -> Result<(), FeedError> {
    let mut lines = Vec::new();
    for record in records {
        serde_json::to_writer(&mut lines, record)
            .map_err(|e| FeedError::Internal(format!("failed to encode record: {e}")))?;
        lines.push(b'\n');
    }

    let io_err = |e: std::io::Error| FeedError::Internal(format!("{}: {e}", path.display()));
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(&lines).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;

    info!(records = records.len(), path = %path.display(), "dead-letter records written");
    Ok(())
}
