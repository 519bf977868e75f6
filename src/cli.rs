//! Command-line interface parsing for reelcache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the cache and OMDb settings used at startup. Connection settings can also
//! come from the `OMDB_API_URL` and `OMDB_API_KEY` environment variables.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::{validate_namespace, CacheError, DEFAULT_NAMESPACE};
use crate::config::{CacheConfig, OmdbConfig, DEFAULT_OMDB_URL};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The namespace could be confused with another namespace's keys
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(#[source] CacheError),

    /// No `--cache-dir` was given and no home directory could be found
    #[error("Could not determine a cache directory; pass --cache-dir or --memory")]
    NoCacheDir,
}

/// reelcache - cached movie catalog lookups and cache management
#[derive(Parser, Debug)]
#[command(name = "reelcache")]
#[command(about = "Cached OMDb movie lookups with a TTL response cache")]
#[command(version)]
pub struct Cli {
    /// Directory holding cache entries (defaults to the XDG cache directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Key prefix for this cache's entries; must end with `_cache_`
    #[arg(long, global = true, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true)]
    pub memory: bool,

    /// OMDb API base URL
    #[arg(long, global = true, env = "OMDB_API_URL", default_value = DEFAULT_OMDB_URL)]
    pub omdb_url: String,

    /// OMDb API key
    #[arg(long, global = true, env = "OMDB_API_KEY", hide_env_values = true)]
    pub omdb_key: Option<String>,

    /// Log more detail to stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show cached keys and their total size
    Stats,
    /// Remove every entry in the namespace
    Clear,
    /// Remove expired and unreadable entries
    ClearExpired,
    /// Print the cached payload for a key, if fresh
    Get { key: String },
    /// Remove a single entry
    Remove { key: String },
    /// Popular titles, seeded by TERM or today's rotation
    Popular {
        term: Option<String>,
        /// TV series instead of movies
        #[arg(long)]
        tv: bool,
    },
    /// Trending titles, seeded by TERM or today's rotation
    Trending {
        term: Option<String>,
        /// TV series instead of movies
        #[arg(long)]
        tv: bool,
    },
    /// Top rated titles, seeded by TERM or today's rotation
    TopRated {
        term: Option<String>,
        /// TV series instead of movies
        #[arg(long)]
        tv: bool,
    },
    /// Search by title
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Search TV series instead of movies
        #[arg(long)]
        tv: bool,
    },
    /// Show one movie by IMDb id
    Details { imdb_id: String },
    /// List genres
    Genres {
        /// TV genres instead of movie genres
        #[arg(long)]
        tv: bool,
    },
    /// Load the popular and trending rows together
    Home,
}

/// Settings derived from CLI arguments for application startup
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub cache: CacheConfig,
    pub omdb: OmdbConfig,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with cache and OMDb settings
    /// * `Err(CliError::InvalidNamespace)` if the namespace is rejected by
    ///   `validate_namespace`
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        validate_namespace(&cli.namespace).map_err(CliError::InvalidNamespace)?;

        Ok(StartupConfig {
            cache: CacheConfig {
                namespace: cli.namespace.clone(),
                dir: cli.cache_dir.clone(),
                in_memory: cli.memory,
            },
            omdb: OmdbConfig {
                base_url: cli.omdb_url.clone(),
                api_key: cli.omdb_key.clone().filter(|k| !k.is_empty()),
            },
        })
    }
}

/// Maps `-v` occurrences to a default log filter
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
