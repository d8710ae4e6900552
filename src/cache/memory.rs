//! Memory Backend Module
//!
//! Bounded in-process map with TTL expiration and batch eviction of the
//! oldest entries.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;

use crate::cache::backend::{BackendUsage, CacheBackend};
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::error::CacheError;

// == Slot ==
/// Entry plus its insertion sequence, used to order entries created in the
/// same millisecond.
#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

// == Memory Store ==
/// Bounded key-value map with TTL expiration.
///
/// When inserting a new key would exceed `capacity`, the oldest
/// `eviction_percent` of entries (by creation time, at least one) are removed
/// in a single batch.
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, Slot>,
    capacity: usize,
    eviction_percent: u8,
    next_seq: u64,
    evictions: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `capacity` entries.
    pub fn new(capacity: usize, eviction_percent: u8) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            eviction_percent: eviction_percent.min(100),
            next_seq: 0,
            evictions: 0,
        }
    }

    // == Set ==
    /// Stores a value, overwriting any entry at `key`.
    ///
    /// Returns the number of entries evicted to make room.
    pub fn set(&mut self, key: String, value: String, ttl_seconds: u64) -> usize {
        let evicted = if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_batch()
        } else {
            0
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            Slot {
                entry: CacheEntry::new(value, ttl_seconds),
                seq,
            },
        );

        evicted
    }

    // == Get ==
    /// Retrieves a value if present and not expired.
    ///
    /// Expired entries are removed as a side effect.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = self.entries.get(key)?.entry.is_expired();
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|slot| slot.entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear By Pattern ==
    /// Removes every key matched by `pattern`. Returns the number removed.
    pub fn clear_matching(&mut self, pattern: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.is_match(key));
        before - self.entries.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Evict Batch ==
    /// Removes the oldest share of entries. Returns the number removed.
    fn evict_batch(&mut self) -> usize {
        let share = self.entries.len() * usize::from(self.eviction_percent) / 100;
        let count = share.max(1);

        let mut by_age: Vec<(u64, u64, String)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.entry.created_at, slot.seq, key.clone()))
            .collect();
        by_age.sort_unstable();

        for (_, _, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }

        self.evictions += count as u64;
        count
    }

    // == Length ==
    /// Returns the current number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `key` is resident, expired or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Rough byte count of keys and values.
    pub fn memory_usage(&self) -> u64 {
        self.entries
            .iter()
            .map(|(key, slot)| (key.len() + slot.entry.approximate_size()) as u64)
            .sum()
    }

    /// Total entries evicted for capacity since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

/// Converts a `*` glob into an anchored regex; every other character is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, CacheError> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Ok(Regex::new(&format!("^{body}$"))?)
}

// == Memory Backend ==
/// [`CacheBackend`] over a [`MemoryStore`] shared behind a lock.
#[derive(Debug)]
pub struct MemoryBackend {
    store: RwLock<MemoryStore>,
}

impl MemoryBackend {
    pub fn new(capacity: usize, eviction_percent: u8) -> Self {
        Self {
            store: RwLock::new(MemoryStore::new(capacity, eviction_percent)),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        // Write lock: expired entries are dropped on read
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let evicted = self
            .store
            .write()
            .await
            .set(key.to_string(), value, ttl_seconds);
        if evicted > 0 {
            tracing::debug!("Memory cache at capacity, evicted {} entries", evicted);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store.write().await.delete(key))
    }

    async fn clear_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let regex = glob_to_regex(pattern)?;
        Ok(self.store.write().await.clear_matching(&regex))
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        Ok(self.store.write().await.cleanup_expired())
    }

    async fn usage(&self) -> Result<BackendUsage, CacheError> {
        let store = self.store.read().await;
        Ok(BackendUsage {
            size: store.len(),
            memory_usage_bytes: store.memory_usage(),
            evictions: store.evictions(),
        })
    }
}
