//! CLI entry point for the dirdl tool.

use anyhow::Result;
use clap::Parser;
use dirdl_core::{HttpClient, IndexClient};
use tracing::{debug, info};

mod app_config;
mod cli;
mod commands;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries listings and result lines
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref() {
        debug!(
            path = %path.display(),
            loaded = loaded.config.is_some(),
            "config file resolved"
        );
    }
    let config = loaded.file_config();

    let client = HttpClient::with_connect_timeout(config.connect_timeout_secs());
    let index = IndexClient::with_client(client.inner().clone());

    match &args.command {
        Command::List(list) => commands::run_list_command(list, &index).await?,
        Command::Get(get) => commands::run_get_command(get, &config, &client, args.quiet).await?,
        Command::Fetch(fetch) => {
            info!(url = %fetch.url, "dirdl starting");
            commands::run_fetch_command(fetch, &config, &index, &client).await?;
        }
    }

    Ok(())
}
