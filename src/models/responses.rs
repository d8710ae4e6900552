//! Response DTOs for the mailbox API
//!
//! Bodies for the endpoints that do not return domain types directly.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::perf::PoolStatus;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active cache backend
    pub backend: String,
    /// Current number of entries in cache
    pub size: usize,
    pub memory_usage_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Swallowed backend failures
    pub errors: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Mailbox session pool occupancy
    pub pool: PoolStatus,
}

impl StatsResponse {
    pub fn new(stats: CacheStats, pool: PoolStatus) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            backend: stats.backend,
            size: stats.size,
            memory_usage_bytes: stats.memory_usage_bytes,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            errors: stats.errors,
            pool,
        }
    }
}

/// Response body for DELETE /cache/accounts/:account_id
#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub message: String,
    pub account_id: String,
    pub removed: usize,
}

impl ClearCacheResponse {
    pub fn new(account_id: impl Into<String>, removed: usize) -> Self {
        let account_id = account_id.into();
        Self {
            message: format!("Cleared {} cache entries for '{}'", removed, account_id),
            account_id,
            removed,
        }
    }
}

/// Response body for POST /prefetch
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchResponse {
    pub prefetched: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
