//! `solrfeed generate`: push synthetic log documents through the batch
//! processor

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use solrfeed_core::{BatchError, BatchProcessor, FlushOutcome, ProcessorConfig};
use solrfeed_domain::FeedConfig;
use solrfeed_infra::{FlushScheduler, SchedulerError, SolrBatchSink, SolrClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{cancel_on_ctrl_c, login_with_retry};
use crate::generator::RecordGenerator;

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Number of write rounds (overrides generator.num_writes)
    #[arg(long)]
    pub num_writes: Option<usize>,

    /// Documents per round (overrides generator.docs_per_write)
    #[arg(long)]
    pub docs_per_write: Option<usize>,

    /// Ask Solr to commit after every batch
    #[arg(long)]
    pub commit: bool,
}

pub async fn run(mut config: FeedConfig, args: GenerateArgs) -> Result<()> {
    if let Some(n) = args.num_writes {
        config.generator.num_writes = n;
    }
    if let Some(n) = args.docs_per_write {
        config.generator.docs_per_write = n;
    }
    config.batch.commit |= args.commit;

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let client =
        Arc::new(SolrClient::from_config(&config).context("failed to create Solr client")?);
    login_with_retry(&client, &config.batch, &shutdown).await?;

    let sink = Arc::new(SolrBatchSink::new(client, &config.batch));
    let processor_config = ProcessorConfig::from(&config.batch);
    let processor =
        Arc::new(BatchProcessor::with_shutdown(sink, processor_config, shutdown.clone()));

    let mut scheduler = FlushScheduler::new(Arc::clone(&processor));
    scheduler.start()?;

    let generator = RecordGenerator::new(config.generator.clone());
    let produced = produce(&processor, generator, &shutdown).await;

    match scheduler.stop().await {
        Ok(()) | Err(SchedulerError::NotRunning) => {}
        Err(e) => warn!(error = %e, "flush scheduler did not stop cleanly"),
    }

    // Second interrupt abandons the drain
    let drain_token = CancellationToken::new();
    cancel_on_ctrl_c(drain_token.clone());
    match processor.drain(&drain_token).await {
        Ok(outcome) => info!(?outcome, "final flush finished"),
        Err(BatchError::Cancelled { pending }) => warn!(pending, "final flush abandoned"),
    }

    let stats = processor.stats();
    info!(
        produced,
        records_delivered = stats.records_delivered,
        batches_delivered = stats.batches_delivered,
        batches_failed = stats.batches_failed,
        records_discarded = stats.records_discarded,
        records_dead_lettered = stats.records_dead_lettered,
        "Solr random documents generation has finished"
    );
    Ok(())
}

/// Append `num_writes x docs_per_write` records; returns how many were
/// appended before completion or shutdown.
async fn produce(
    processor: &BatchProcessor<solrfeed_domain::Record, SolrBatchSink>,
    mut generator: RecordGenerator,
    shutdown: &CancellationToken,
) -> usize {
    let num_writes = generator.config().num_writes;
    let docs_per_write = generator.config().docs_per_write;
    let mut produced = 0;

    for round in 1..=num_writes {
        for _ in 0..docs_per_write {
            if shutdown.is_cancelled() {
                return produced;
            }
            match processor.append(generator.next_record()).await {
                Ok(Some(FlushOutcome::Failed { records, attempts, resolution })) => {
                    warn!(records, attempts, ?resolution, "batch not delivered");
                }
                Ok(_) => {}
                Err(BatchError::Cancelled { pending }) => {
                    warn!(pending, "delivery interrupted");
                    return produced + 1;
                }
            }
            produced += 1;
        }
        info!(round, num_writes, docs_per_write, "Sending documents to Solr");
    }
    produced
}
