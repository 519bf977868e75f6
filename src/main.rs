//! reelcache - cached OMDb movie lookups
//!
//! A command-line front end over a TTL response cache. Listings, searches and
//! detail lookups are served from the cache while fresh and fetched from the
//! OMDb API otherwise.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use reelcache::app;
use reelcache::cache::{FileStore, MemoryStore, Substrate, TtlCache};
use reelcache::cli::{log_filter, Cli, CliError, Command, StartupConfig};
use reelcache::config::{OmdbConfig, TtlPolicy};
use reelcache::fetch::CachedFetcher;
use reelcache::omdb::OmdbClient;

/// Sends log output to stderr so command output on stdout stays clean
fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Builds the client over `store` and runs one command
async fn run_with<S: Substrate>(
    store: S,
    namespace: String,
    omdb: OmdbConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache = Arc::new(TtlCache::with_namespace(store, namespace)?);
    let fetcher = CachedFetcher::new(cache, TtlPolicy::default());
    let client = OmdbClient::new(omdb, fetcher);

    app::run(command, &client, &mut io::stdout().lock()).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StartupConfig::from_cli(&cli)?;
    let cache = config.cache;

    if cache.in_memory {
        run_with(MemoryStore::new(), cache.namespace, config.omdb, cli.command).await?;
    } else {
        let store = match cache.dir {
            Some(dir) => FileStore::with_dir(dir),
            None => FileStore::new().ok_or(CliError::NoCacheDir)?,
        };
        tracing::debug!(dir = %store.dir().display(), "using file cache");
        run_with(store, cache.namespace, config.omdb, cli.command).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
