//! `solrfeed query`: run a select and print the response envelope

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use solrfeed_domain::FeedConfig;
use solrfeed_infra::{SolrClient, SolrQuery};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancel_on_ctrl_c, login_with_retry};

#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Main query (`q`)
    #[arg(short, long, default_value = "*:*")]
    pub q: String,

    /// Filter query (`fq`), repeatable
    #[arg(long = "fq")]
    pub filter_queries: Vec<String>,

    /// Facet field, repeatable
    #[arg(long = "facet-field")]
    pub facet_fields: Vec<String>,

    /// Comma-separated pivot fields
    #[arg(long, value_delimiter = ',')]
    pub pivot: Vec<String>,

    /// Comma-separated field list (`fl`)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    #[arg(long)]
    pub start: Option<u64>,

    #[arg(long)]
    pub rows: Option<u64>,

    /// e.g. "logtime desc"
    #[arg(long)]
    pub sort: Option<String>,
}

impl QueryArgs {
    pub fn to_query(&self) -> SolrQuery {
        let mut query = SolrQuery::new();
        query.query(&self.q);
        for fq in &self.filter_queries {
            query.filter_query(fq);
        }
        for field in &self.facet_fields {
            query.add_facet(field);
        }
        if !self.pivot.is_empty() {
            query.add_pivot_fields(&self.pivot);
        }
        query.add_fields(&self.fields);
        if let Some(start) = self.start {
            query.start(start);
        }
        if let Some(rows) = self.rows {
            query.rows(rows);
        }
        if let Some(sort) = &self.sort {
            query.sort(sort);
        }
        query
    }
}

pub async fn run(config: FeedConfig, args: QueryArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let client =
        Arc::new(SolrClient::from_config(&config).context("failed to create Solr client")?);
    login_with_retry(&client, &config.batch, &cancel).await?;

    let query = args.to_query();
    info!(uri = %client.collection_uri("select"), params = %query.encode(), "Query");
    let response = tokio::select! {
        () = cancel.cancelled() => anyhow::bail!("query interrupted"),
        response = client.query(&query) => response?,
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &response)?;
    writeln!(stdout)?;
    Ok(())
}
