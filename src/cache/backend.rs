//! Cache Backend Module
//!
//! The interface every storage backend implements, and the construction-time
//! choice between them.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

// == Backend Kind ==
/// Which backend a [`crate::cache::CacheStore`] is built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Bounded in-process map
    Memory,
    /// Shared Redis instance
    Redis { url: String },
}

// == Store Options ==
/// Everything needed to construct a cache store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backend: BackendKind,
    /// Memory backend capacity (also used by the fallback)
    pub max_entries: usize,
    /// Memory backend eviction share, in percent
    pub eviction_percent: u8,
    /// Upper bound on the Redis connection attempt
    pub connect_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            max_entries: 1000,
            eviction_percent: 10,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

// == Backend Usage ==
/// Size figures reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendUsage {
    /// Resident entries
    pub size: usize,
    /// Estimated bytes used
    pub memory_usage_bytes: u64,
    /// Entries removed for capacity
    pub evictions: u64,
}

// == Cache Backend Trait ==
/// Raw key-value storage with per-entry TTL.
///
/// Values are opaque strings; typing happens one layer up. Every method may
/// fail, and callers are expected to treat failures as misses.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for stats
    fn kind(&self) -> &'static str;

    /// Returns the value if present and still valid
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a value, replacing any previous one
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Removes a key, returning whether it existed; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key matching a `*` glob, returning how many were removed
    async fn clear_by_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Eagerly drops expired entries
    async fn sweep_expired(&self) -> Result<usize, CacheError>;

    /// Current size figures
    async fn usage(&self) -> Result<BackendUsage, CacheError>;
}
