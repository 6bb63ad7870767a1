//! Subcommand implementations

pub mod generate;
pub mod query;

use std::sync::Arc;

use solrfeed_common::{policies::PredicateRetry, RetryConfig, RetryExecutor};
use solrfeed_domain::{BatchConfig, FeedError};
use solrfeed_infra::SolrClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Log in with the batch retry settings. KDC rejections are retried,
/// configuration errors fail at once.
pub async fn login_with_retry(
    client: &Arc<SolrClient>,
    batch: &BatchConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if !client.session().is_kerberos() {
        return Ok(());
    }

    let executor = RetryExecutor::new(
        RetryConfig::new(batch.max_retries, batch.retry_interval()),
        PredicateRetry::new(|err: &FeedError, _| login_retryable(err)),
    );
    let outcome = executor.execute_with_outcome(|| client.login(), cancel).await;
    let attempts = outcome.attempts;
    outcome.into_result().map_err(|e| anyhow::anyhow!("kerberos login failed: {e}"))?;

    info!(attempts, "kerberos login complete");
    Ok(())
}

fn login_retryable(err: &FeedError) -> bool {
    err.is_retryable() || matches!(err, FeedError::Auth(_))
}

/// Cancel `token` on Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, shutting down");
            token.cancel();
        }
    });
}
