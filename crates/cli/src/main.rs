//! `solrfeed`: feed synthetic documents into Solr or query a collection

mod commands;
mod generator;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solrfeed_domain::FeedConfig;
use solrfeed_infra::auth::export_krb5_environment;
use solrfeed_infra::config;
use tracing::info;

use commands::generate::GenerateArgs;
use commands::query::QueryArgs;
use logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "solrfeed", version, about = "Buffered, retrying document feeder for Solr")]
struct Cli {
    /// Configuration file; a default one is written here if it does not exist
    #[arg(short, long, global = true, env = "SOLRFEED_CONFIG", default_value = "solrfeed.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate random log documents and send them in batches (default)
    Generate(GenerateArgs),
    /// Run a select query and print the response
    Query(QueryArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_format, "info");

    if !cli.config.exists() {
        config::write_default(&cli.config)?;
        info!(
            path = %cli.config.display(),
            "No configuration found; wrote defaults. Edit it and run again."
        );
        return Ok(());
    }

    let config = config::load(&cli.config)?;
    info!(url = %config.solr.url, collection = %config.solr.collection, "Starting Solr client");

    // Process environment is only written here, before any worker thread exists
    if let Some(kerberos) = &config.security.kerberos {
        export_krb5_environment(kerberos);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(dispatch(config, cli.command))
}

async fn dispatch(config: FeedConfig, command: Option<Commands>) -> Result<()> {
    match command.unwrap_or_else(|| Commands::Generate(GenerateArgs::default())) {
        Commands::Generate(args) => commands::generate::run(config, args).await,
        Commands::Query(args) => commands::query::run(config, args).await,
    }
}
