//! Namespaced TTL cache over a key/value substrate
//!
//! Provides a `TtlCache` that stores serializable payloads with a per-entry
//! freshness window. Expired or unreadable entries are dropped the next time
//! they are read. Storage failures never reach the caller: they are logged and
//! the operation degrades to a miss or a no-op write.

use chrono::Duration;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::entry::CacheEntry;
use super::store::{StoreError, Substrate};

/// Prefix applied to every key this cache writes
pub const DEFAULT_NAMESPACE: &str = "netflix_cache_";

/// Every namespace ends with this marker and contains it nowhere else
pub const NAMESPACE_SUFFIX: &str = "_cache_";

/// Errors produced by cache operations
///
/// Only `InvalidArgument` is ever returned from the public API; the other
/// variants are logged and swallowed.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The caller passed an empty key or a non-positive TTL
    #[error("invalid cache argument: {0}")]
    InvalidArgument(String),

    /// The underlying store could not be read or written
    #[error("cache storage unavailable: {0}")]
    SubstrateUnavailable(#[from] StoreError),

    /// A stored entry or payload could not be (de)serialized
    #[error("cache entry could not be (de)serialized: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Outcome of a single read, before it is collapsed to `Option`
#[derive(Debug)]
enum Lookup<T> {
    Hit(T),
    Miss,
    Expired,
    Failed(CacheError),
}

/// Raw inventory of the entries in one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys present, without the namespace prefix, in ascending order
    pub keys: Vec<String>,
    /// Sum of the serialized length of every entry, in bytes
    pub total_size_bytes: usize,
}

impl CacheStats {
    /// Formats `total_size_bytes` as B, KB or MB
    pub fn human_size(&self) -> String {
        let bytes = self.total_size_bytes;
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

/// A namespaced cache with per-entry time-to-live
///
/// Several caches may share one substrate through [`TtlCache::on_shared`]; each
/// only sees and clears the keys under its own namespace. Every operation runs
/// under the substrate lock, so a read and the eviction it triggers are atomic.
pub struct TtlCache<S> {
    store: Arc<Mutex<S>>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

/// Checks that `namespace` can share a substrate with other namespaces
///
/// A namespace must end with [`NAMESPACE_SUFFIX`] and contain it only there.
/// Such namespaces never prefix one another, so `netflix_` is rejected while
/// `netflix_cache_` and `shows_cache_` may live side by side.
pub fn validate_namespace(namespace: &str) -> Result<(), CacheError> {
    match namespace.find(NAMESPACE_SUFFIX) {
        Some(at) if at + NAMESPACE_SUFFIX.len() == namespace.len() => Ok(()),
        Some(_) => Err(CacheError::InvalidArgument(format!(
            "namespace '{}' contains '{}' before its end",
            namespace, NAMESPACE_SUFFIX
        ))),
        None => Err(CacheError::InvalidArgument(format!(
            "namespace '{}' must end with '{}'",
            namespace, NAMESPACE_SUFFIX
        ))),
    }
}

impl<S: Substrate> TtlCache<S> {
    /// Creates a cache owning `store` under the default namespace
    pub fn new(store: S) -> Self {
        Self::build(Arc::new(Mutex::new(store)), DEFAULT_NAMESPACE.to_string())
    }

    pub fn with_namespace(store: S, namespace: impl Into<String>) -> Result<Self, CacheError> {
        Self::on_shared(Arc::new(Mutex::new(store)), namespace)
    }

    /// Creates a cache over a substrate other caches may also use
    ///
    /// Returns `Err(CacheError::InvalidArgument)` unless `namespace` passes
    /// [`validate_namespace`]; otherwise one cache could list and clear the
    /// entries of another whose namespace it prefixes.
    pub fn on_shared(
        store: Arc<Mutex<S>>,
        namespace: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self::build(store, namespace))
    }

    fn build(store: Arc<Mutex<S>>, namespace: String) -> Self {
        Self {
            store,
            namespace,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source used for timestamps and freshness checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Handle to the underlying substrate
    pub fn substrate(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Stores `value` under `key` for `ttl`
    ///
    /// Returns `Err(CacheError::InvalidArgument)` for an empty key or a TTL
    /// that is not positive. Serialization and storage failures are logged
    /// and reported as `Ok(())`.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::InvalidArgument("key must not be empty".to_string()));
        }
        if ttl <= Duration::zero() {
            return Err(CacheError::InvalidArgument(format!(
                "ttl must be positive, got {}ms",
                ttl.num_milliseconds()
            )));
        }

        match self.try_set(key, value, ttl) {
            Ok(()) => {
                debug!(key, ttl_ms = ttl.num_milliseconds(), "cached entry");
            }
            Err(e) => {
                warn!(key, error = %e, "failed to cache entry");
            }
        }
        Ok(())
    }

    fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: value,
            timestamp: self.clock.now_millis(),
            ttl: ttl.num_milliseconds(),
        };
        let json = serde_json::to_string(&entry)?;
        self.store.lock().write(&self.full_key(key), &json)?;
        Ok(())
    }

    /// Returns the payload under `key` if it exists and is still fresh
    ///
    /// Expired and malformed entries are evicted as a side effect. A payload
    /// that parses as an entry but not as `T` is reported as a miss and left
    /// in place.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.lookup(key) {
            Lookup::Hit(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Lookup::Miss => {
                debug!(key, "cache miss");
                None
            }
            Lookup::Expired => {
                debug!(key, "cache expired");
                None
            }
            Lookup::Failed(e) => {
                warn!(key, error = %e, "failed to read cached entry");
                None
            }
        }
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let full_key = self.full_key(key);
        let mut store = self.store.lock();

        let raw = match store.read(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Lookup::Miss,
            Err(e) => return Lookup::Failed(e.into()),
        };

        let entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                evict(&mut *store, &full_key);
                return Lookup::Failed(e.into());
            }
        };

        if !entry.is_fresh(self.clock.now_millis()) {
            evict(&mut *store, &full_key);
            return Lookup::Expired;
        }

        match serde_json::from_value(entry.data) {
            Ok(value) => Lookup::Hit(value),
            Err(e) => Lookup::Failed(e.into()),
        }
    }

    /// Deletes the entry under `key`; absent keys are ignored
    pub fn remove(&self, key: &str) {
        evict(&mut *self.store.lock(), &self.full_key(key));
    }

    /// Deletes every entry in this namespace and returns how many were removed
    ///
    /// Keys outside the namespace are left untouched.
    pub fn clear(&self) -> usize {
        let mut store = self.store.lock();
        let keys = self.namespaced_keys(&*store);
        let mut removed = 0;
        for key in &keys {
            if evict(&mut *store, key) {
                removed += 1;
            }
        }
        debug!(namespace = %self.namespace, removed, "cleared cache");
        removed
    }

    /// Lists this namespace's keys and their total serialized size
    ///
    /// Expired entries that have not been read since they went stale are
    /// still listed.
    pub fn stats(&self) -> CacheStats {
        let store = self.store.lock();
        let mut stats = CacheStats::default();

        for full_key in self.namespaced_keys(&*store) {
            match store.read(&full_key) {
                Ok(Some(raw)) => {
                    stats.total_size_bytes += raw.len();
                    stats.keys.push(full_key[self.namespace.len()..].to_string());
                }
                Ok(None) => {}
                Err(e) => warn!(key = %full_key, error = %e, "failed to read entry for stats"),
            }
        }
        stats
    }

    /// Evicts every stale or unreadable entry in this namespace
    ///
    /// Runs as a single pass under one lock rather than going through `get`,
    /// and returns how many entries were evicted.
    pub fn clear_expired(&self) -> usize {
        let mut store = self.store.lock();
        let now = self.clock.now_millis();
        let mut evicted = 0;

        for full_key in self.namespaced_keys(&*store) {
            let stale = match store.read(&full_key) {
                Ok(Some(raw)) => match serde_json::from_str::<CacheEntry<Value>>(&raw) {
                    Ok(entry) => !entry.is_fresh(now),
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(e) => {
                    warn!(key = %full_key, error = %e, "failed to read entry during sweep");
                    false
                }
            };
            if stale && evict(&mut *store, &full_key) {
                evicted += 1;
            }
        }
        debug!(namespace = %self.namespace, evicted, "swept expired entries");
        evicted
    }

    fn namespaced_keys(&self, store: &S) -> Vec<String> {
        match store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.namespace))
                .collect(),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "failed to list cache keys");
                Vec::new()
            }
        }
    }
}

/// Deletes `full_key`, logging failures; returns whether the delete succeeded
fn evict<S: Substrate + ?Sized>(store: &mut S, full_key: &str) -> bool {
    match store.delete(full_key) {
        Ok(()) => true,
        Err(e) => {
            warn!(key = %full_key, error = %e, "failed to evict cache entry");
            false
        }
    }
}
