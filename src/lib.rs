//! reelcache library
//!
//! A namespaced TTL response cache, a cache-first fetch wrapper, and an OMDb
//! client built on both. Exposed as a library for the binary and integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod omdb;
