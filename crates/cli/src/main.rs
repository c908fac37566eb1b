//! tome command-line entry point.
//!
//! Fetched bytes go to stdout; logging goes to stderr so the two never mix.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tome_client::ResourceLoader;
use tome_core::AppConfig;

mod commands;

use commands::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = AppConfig::load()?;
    if args.offline {
        config.offline = true;
    }
    tracing::debug!(cache_dir = %config.cache_dir.display(), offline = config.offline, "starting tome");

    let loader = ResourceLoader::from_config(&config).await?;

    match args.command {
        Command::Open { url, no_cache, stable } => commands::open(&loader, &url, no_cache, stable).await,
        Command::Check { url, stable } => commands::check(&loader, &url, stable).await,
        Command::Clean { all } => commands::clean(&loader, all).await,
        Command::Put { id, file } => commands::put(&loader, &id, &file).await,
        Command::Get { id } => commands::get(&loader, &id).await,
        Command::Remove { id } => commands::remove(&loader, &id).await,
    }
}
