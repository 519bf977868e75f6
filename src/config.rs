//! Configuration for the cache and the cached OMDb client
//!
//! TTL durations are policy defaults, not invariants of the cache: the cache
//! stores whatever TTL it is handed.

use chrono::Duration;
use std::path::PathBuf;

use crate::cache::DEFAULT_NAMESPACE;

/// Default OMDb endpoint
pub const DEFAULT_OMDB_URL: &str = "http://www.omdbapi.com";

/// Category of cached data, each with its own freshness window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Catalog listings such as "popular"
    Catalog,
    /// Trending listings
    Trending,
    /// Free-text search results
    Search,
    /// A single item's detail record
    Detail,
    /// Static taxonomies such as the genre list
    Taxonomy,
}

/// Freshness window per data category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    pub catalog: Duration,
    pub trending: Duration,
    pub search: Duration,
    pub detail: Duration,
    pub taxonomy: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            catalog: Duration::hours(6),
            trending: Duration::hours(2),
            search: Duration::hours(1),
            detail: Duration::hours(24),
            taxonomy: Duration::days(7),
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Catalog => self.catalog,
            TtlClass::Trending => self.trending,
            TtlClass::Search => self.search,
            TtlClass::Detail => self.detail,
            TtlClass::Taxonomy => self.taxonomy,
        }
    }
}

/// Where and under which prefix cache entries are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Key prefix for this cache's entries
    pub namespace: String,
    /// Directory for the file store; `None` means the XDG cache directory
    pub dir: Option<PathBuf>,
    /// Keep entries in memory only
    pub in_memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            dir: None,
            in_memory: false,
        }
    }
}

/// Connection settings for the OMDb API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmdbConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OMDB_URL.to_string(),
            api_key: None,
        }
    }
}
