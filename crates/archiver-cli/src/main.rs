mod cli;

use anyhow::Result;
use clap::Parser;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

use archiver_azure::{BlobServiceClient, ClientOptions, RetryPolicy, TransportOptions};
use archiver_config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries only the progress log
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let mut policy = config.policy();
    if let Some(tier) = cli.tier {
        policy.target = tier;
    }
    if cli.continue_on_error {
        policy.continue_on_error = true;
    }

    let client = BlobServiceClient::new(config.connection_string()?, client_options(&config))
        .map_err(archiver_core::Error::from)?;
    info!(endpoint = %client.endpoint(), tier = %policy.target, "starting run");

    let summary = archiver_core::run(
        &client,
        policy,
        cli.container.as_deref(),
        cli.directory.as_deref(),
        io::stdout(),
    )
    .await?;

    info!(
        containers = summary.containers_processed,
        directories = summary.directories_processed,
        updated = summary.blobs_updated,
        unchanged = summary.blobs_unchanged,
        unknown = summary.unknown_items,
        failed = summary.failed_updates,
        "run complete"
    );

    Ok(())
}

fn client_options(config: &Config) -> ClientOptions {
    ClientOptions {
        retry: RetryPolicy {
            initial_delay: config.retry.initial_delay(),
            max_attempts: config.retry.max_attempts,
        },
        transport: TransportOptions {
            tcp_nodelay: config.transport.tcp_nodelay,
            max_idle_per_host: config.transport.max_idle_per_host,
            connect_timeout: config.transport.connect_timeout(),
            request_timeout: config.transport.request_timeout(),
        },
    }
}
