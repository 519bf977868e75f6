//! Stored entry format
//!
//! Entries are written as compact JSON: `{"data":...,"timestamp":...,"ttl":...}`
//! with `timestamp` and `ttl` in milliseconds.

use serde::{Deserialize, Serialize};

/// Wrapper struct for a cached payload as it sits in the store
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheEntry<T> {
    /// The cached payload
    pub data: T,
    /// When the entry was written (ms since epoch)
    pub timestamp: i64,
    /// Freshness window in ms
    pub ttl: i64,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh while `now - timestamp <= ttl`
    pub fn is_fresh(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.timestamp) <= self.ttl
    }
}
