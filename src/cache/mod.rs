//! Cache module for storing API responses
//!
//! This module provides a namespaced TTL cache that sits on a pluggable
//! key/value substrate (in-memory or one file per key on disk). Entries are
//! evicted lazily when read after their TTL, and every storage failure
//! degrades to a cache miss so callers can always fall back to the origin.

mod clock;
mod entry;
mod manager;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{
    validate_namespace, CacheError, CacheStats, TtlCache, DEFAULT_NAMESPACE, NAMESPACE_SUFFIX,
};
pub use store::{FileStore, MemoryStore, StoreError, Substrate};
