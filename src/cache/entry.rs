//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// Represents a single cache entry with its serialized value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value (JSON text)
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime in seconds, always > 0
    pub ttl_seconds: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// A zero TTL is raised to one second so every entry is valid at least
    /// until the next tick.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        Self {
            value,
            created_at: current_timestamp_ms(),
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    // == Expires At ==
    /// Unix millisecond timestamp from which the entry is no longer valid.
    pub fn expires_at(&self) -> u64 {
        self.created_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is valid while `now - created_at < ttl_seconds * 1000`, so it
    /// expires exactly when the full TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`CacheEntry::is_expired`] against an explicit clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at()
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at().saturating_sub(current_timestamp_ms())
    }

    /// Approximate heap footprint of the entry, used for memory estimates.
    pub fn approximate_size(&self) -> usize {
        self.value.len() + std::mem::size_of::<Self>()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
