//! Cache Store Module
//!
//! Typed, failure-isolating front for a [`CacheBackend`]. Nothing above this
//! layer ever sees a cache error: failures are logged and treated as a miss
//! or a no-op.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::backend::{BackendKind, CacheBackend, StoreOptions};
use crate::cache::memory::MemoryBackend;
use crate::cache::redis::RedisBackend;
use crate::cache::stats::{CacheStats, Counters};

// == Cache Store ==
/// Process-wide cache handle. Clones share the same backend and counters.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    counters: Arc<Counters>,
}

impl CacheStore {
    // == Constructors ==
    /// Wraps an existing backend.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            counters: Arc::new(Counters::default()),
        }
    }

    /// In-process store with the given capacity and eviction share.
    pub fn memory(max_entries: usize, eviction_percent: u8) -> Self {
        Self::new(Arc::new(MemoryBackend::new(max_entries, eviction_percent)))
    }

    /// Builds the store selected by `options.backend`.
    ///
    /// An unreachable Redis falls back to the memory backend instead of
    /// failing startup.
    pub async fn connect(options: &StoreOptions) -> Self {
        match &options.backend {
            BackendKind::Memory => {
                info!(
                    "Using in-memory cache (max_entries={}, eviction={}%)",
                    options.max_entries, options.eviction_percent
                );
                Self::memory(options.max_entries, options.eviction_percent)
            }
            BackendKind::Redis { url } => {
                match tokio::time::timeout(options.connect_timeout, RedisBackend::connect(url))
                    .await
                {
                    Ok(Ok(backend)) => {
                        info!("Using Redis cache");
                        Self::new(Arc::new(backend))
                    }
                    Ok(Err(e)) => {
                        warn!("Redis unavailable ({}), falling back to in-memory cache", e);
                        Self::memory(options.max_entries, options.eviction_percent)
                    }
                    Err(_) => {
                        warn!(
                            "Redis connection timed out after {:?}, falling back to in-memory cache",
                            options.connect_timeout
                        );
                        Self::memory(options.max_entries, options.eviction_percent)
                    }
                }
            }
        }
    }

    /// Name of the active backend.
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    // == Get ==
    /// Returns the cached value, or `None` on miss, expiry, or any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss: {}", key);
                self.counters.record_miss();
                return None;
            }
            Err(e) => {
                warn!("Cache get failed for {}: {}", key, e);
                self.counters.record_error();
                self.counters.record_miss();
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                self.counters.record_hit();
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.counters.record_error();
                self.counters.record_miss();
                self.delete(key).await;
                None
            }
        }
    }

    // == Set ==
    /// Stores a value for `ttl_seconds`. Failures are logged and ignored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache value for {} could not be serialized: {}", key, e);
                self.counters.record_error();
                return;
            }
        };

        if let Err(e) = self.backend.set(key, raw, ttl_seconds).await {
            warn!("Cache set failed for {}: {}", key, e);
            self.counters.record_error();
        }
    }

    // == Delete ==
    /// Removes a key. Returns whether it existed; absent keys and failures
    /// are both silent.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                self.counters.record_error();
                false
            }
        }
    }

    // == Clear By Pattern ==
    /// Removes every key matching a `*` glob. Returns the number removed,
    /// `0` on failure.
    pub async fn clear_by_pattern(&self, pattern: &str) -> usize {
        match self.backend.clear_by_pattern(pattern).await {
            Ok(removed) => {
                debug!("Cleared {} entries matching {}", removed, pattern);
                removed
            }
            Err(e) => {
                warn!("Cache pattern clear failed for {}: {}", pattern, e);
                self.counters.record_error();
                0
            }
        }
    }

    // == Sweep ==
    /// Eagerly removes expired entries.
    pub async fn sweep_expired(&self) -> usize {
        match self.backend.sweep_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache sweep failed: {}", e);
                self.counters.record_error();
                0
            }
        }
    }

    // == Stats ==
    /// Returns current cache statistics. Backend size figures are zero when
    /// the backend cannot report them.
    pub async fn stats(&self) -> CacheStats {
        let usage = match self.backend.usage().await {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Cache usage unavailable: {}", e);
                self.counters.record_error();
                Default::default()
            }
        };
        let (hits, misses, errors) = self.counters.snapshot();

        CacheStats {
            backend: self.backend.kind().to_string(),
            size: usage.size,
            memory_usage_bytes: usage.memory_usage_bytes,
            hits,
            misses,
            evictions: usage.evictions,
            errors,
        }
    }
}
