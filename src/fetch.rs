//! Cache-first wrapper around origin requests
//!
//! `CachedFetcher` consults the TTL cache before calling an origin and stores
//! the origin's response afterwards, but only when the caller's success
//! predicate accepts it. Error payloads are never cached.

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheError, Substrate, TtlCache};
use crate::config::{TtlClass, TtlPolicy};

/// Decides TTLs by data category and fronts origin calls with a `TtlCache`
pub struct CachedFetcher<S> {
    cache: Arc<TtlCache<S>>,
    policy: TtlPolicy,
}

impl<S: Substrate> CachedFetcher<S> {
    pub fn new(cache: Arc<TtlCache<S>>, policy: TtlPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn cache(&self) -> &TtlCache<S> {
        &self.cache
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Returns the cached value for `key`, or calls `origin` and caches its result
    ///
    /// # Arguments
    /// * `key` - Cache key, usually `{category}_{query_or_id}`
    /// * `class` - Data category that selects the TTL
    /// * `is_success` - Whether an origin response is worth caching
    /// * `origin` - Produces the value on a miss
    ///
    /// # Returns
    /// * `Ok(T)` from the cache on a hit, without calling `origin`
    /// * `Ok(T)` from `origin` on a miss, cached only if `is_success` accepts it
    /// * `Err(E)` from `CacheError::InvalidArgument` for an empty key or a
    ///   non-positive TTL for `class`, before the cache or `origin` is touched
    /// * `Err(E)` if `origin` fails
    pub async fn fetch<T, E, P, F, Fut>(
        &self,
        key: &str,
        class: TtlClass,
        is_success: P,
        origin: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        P: FnOnce(&T) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = self.policy.ttl_for(class);
        if key.is_empty() {
            return Err(CacheError::InvalidArgument("key must not be empty".to_string()).into());
        }
        if ttl <= Duration::zero() {
            return Err(CacheError::InvalidArgument(format!(
                "ttl for {:?} must be positive, got {}ms",
                class,
                ttl.num_milliseconds()
            ))
            .into());
        }

        if let Some(cached) = self.cache.get::<T>(key) {
            debug!(key, "using cached data");
            return Ok(cached);
        }

        debug!(key, "requesting from origin");
        let value = origin().await?;

        if is_success(&value) {
            self.cache.set(key, &value, ttl)?;
        } else {
            debug!(key, "origin response rejected, not caching");
        }
        Ok(value)
    }
}
