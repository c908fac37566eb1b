//! Subcommands over a [`ResourceLoader`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use tome_client::{Request, ResourceLoader};

#[derive(Parser, Debug)]
#[command(name = "tome", about = "Fetch and cache story resources", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Never touch the network; serve from the cache only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a URL and write its bytes to stdout
    Open {
        url: String,

        /// Bypass the cache (unless offline)
        #[arg(long)]
        no_cache: bool,

        /// The resource rarely changes
        #[arg(long)]
        stable: bool,
    },

    /// Report whether a fresh copy of a URL is cached
    Check {
        url: String,

        #[arg(long)]
        stable: bool,
    },

    /// Remove old cache entries, or everything with --all
    Clean {
        #[arg(long)]
        all: bool,
    },

    /// Store a file in the cache under an id
    Put { id: String, file: PathBuf },

    /// Write the bytes cached under an id to stdout
    Get { id: String },

    /// Delete the entry cached under an id
    Remove { id: String },
}

/// Output of the `check` command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    pub url: String,
    pub stable: bool,
    pub cached: bool,
}

/// Output of the `clean` command.
#[derive(Debug, Clone, Serialize)]
pub struct CleanOutput {
    pub only_old: bool,
    pub deleted: usize,
}

pub async fn open(loader: &ResourceLoader, url: &str, no_cache: bool, stable: bool) -> Result<()> {
    let request = Request::parse(url)?.stable(stable);
    let bytes = if no_cache {
        loader.open_no_cache(request, None).await?
    } else {
        loader.open(request, None).await?
    };
    write_stdout(&bytes).await
}

pub async fn check(loader: &ResourceLoader, url: &str, stable: bool) -> Result<()> {
    let request = Request::parse(url)?;
    let cached = loader.check(&request.url, stable).await;
    print_json(&CheckOutput { url: request.url.to_string(), stable, cached })
}

pub async fn clean(loader: &ResourceLoader, all: bool) -> Result<()> {
    let deleted = loader.clean_cache(!all).await;
    print_json(&CleanOutput { only_old: !all, deleted })
}

pub async fn put(loader: &ResourceLoader, id: &str, file: &Path) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let written = loader.add_to_cache(&data, id).await?;
    tracing::info!(id, bytes = written, "stored");
    Ok(())
}

pub async fn get(loader: &ResourceLoader, id: &str) -> Result<()> {
    match loader.get_from_cache(id).await? {
        Some(bytes) => write_stdout(&bytes).await,
        None => bail!("nothing cached under {id:?}"),
    }
}

pub async fn remove(loader: &ResourceLoader, id: &str) -> Result<()> {
    if !loader.remove_from_cache(id).await {
        bail!("nothing cached under {id:?}");
    }
    Ok(())
}

async fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(bytes).await?;
    stdout.flush().await?;
    Ok(())
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}
