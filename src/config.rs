//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{BackendKind, EmailTtlPolicy, SearchCachePolicy, StoreOptions, TtlPolicy};
use crate::perf::RetryPolicy;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// External store URL; `None` selects the in-process backend
    pub redis_url: Option<String>,
    /// How long to wait for the external store at startup
    pub redis_connect_timeout_ms: u64,
    /// Maximum number of entries the memory backend can hold
    pub max_entries: usize,
    /// Share of entries removed per eviction batch, in percent
    pub eviction_percent: u8,
    /// Per resource class TTLs
    pub ttl: TtlPolicy,
    /// Which searches are safe to cache
    pub search_policy: SearchCachePolicy,
    /// Maximum pooled sessions
    pub pool_max_size: usize,
    /// Items per chunk for bulk operations
    pub batch_size: usize,
    /// Attempts made by the retry helper before giving up
    pub retry_max_attempts: u32,
    /// First retry delay in milliseconds, doubled after every failure
    pub retry_base_delay_ms: u64,
    /// Number of candidates warmed by a prefetch pass
    pub prefetch_top_k: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Account identity folded into every cache key
    pub account: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - External store URL (default: unset, memory backend)
    /// - `REDIS_CONNECT_TIMEOUT_MS` - Connect timeout (default: 2000)
    /// - `CACHE_MAX_ENTRIES` - Memory backend capacity (default: 1000)
    /// - `CACHE_EVICTION_PERCENT` - Batch eviction share (default: 10)
    /// - `CACHE_EMAIL_LIST_TTL` - Email list TTL in seconds (default: 300)
    /// - `CACHE_SEARCH_TTL` - Search result TTL in seconds (default: 180)
    /// - `CACHE_FOLDER_LIST_TTL` - Folder list TTL in seconds (default: 3600)
    /// - `CACHE_EMAIL_TTL` - Base single email TTL in seconds (default: 1800)
    /// - `CACHE_EMAIL_MIN_TTL` - Floor for unread email TTL (default: 120)
    /// - `CACHE_SEARCH_DATE_RANGES` - Cache date-range searches (default: false)
    /// - `CACHE_SEARCH_READ_STATUS` - Cache read-status searches (default: false)
    /// - `POOL_MAX_SIZE` - Maximum pooled sessions (default: 5)
    /// - `BATCH_SIZE` - Bulk operation chunk size (default: 10)
    /// - `RETRY_MAX_ATTEMPTS` - Retry attempts (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - First retry delay (default: 100)
    /// - `PREFETCH_TOP_K` - Prefetch candidates per pass (default: 3)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `MAIL_ACCOUNT` - Account identity (default: "default")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_email = defaults.ttl.email.clone();

        Self {
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            redis_connect_timeout_ms: env_or(
                "REDIS_CONNECT_TIMEOUT_MS",
                defaults.redis_connect_timeout_ms,
            ),
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            eviction_percent: env_or("CACHE_EVICTION_PERCENT", defaults.eviction_percent),
            ttl: TtlPolicy {
                email_list: env_or("CACHE_EMAIL_LIST_TTL", defaults.ttl.email_list),
                search: env_or("CACHE_SEARCH_TTL", defaults.ttl.search),
                folder_list: env_or("CACHE_FOLDER_LIST_TTL", defaults.ttl.folder_list),
                email: EmailTtlPolicy {
                    base: env_or("CACHE_EMAIL_TTL", default_email.base),
                    min_ttl: env_or("CACHE_EMAIL_MIN_TTL", default_email.min_ttl),
                    ..default_email
                },
            },
            search_policy: SearchCachePolicy {
                cache_date_ranges: env_or(
                    "CACHE_SEARCH_DATE_RANGES",
                    defaults.search_policy.cache_date_ranges,
                ),
                cache_read_status: env_or(
                    "CACHE_SEARCH_READ_STATUS",
                    defaults.search_policy.cache_read_status,
                ),
            },
            pool_max_size: env_or("POOL_MAX_SIZE", defaults.pool_max_size),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size),
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            prefetch_top_k: env_or("PREFETCH_TOP_K", defaults.prefetch_top_k),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            account: env::var("MAIL_ACCOUNT").unwrap_or(defaults.account),
        }
    }

    /// Backend selection and sizing for the cache store.
    pub fn store_options(&self) -> StoreOptions {
        let backend = match &self.redis_url {
            Some(url) => BackendKind::Redis { url: url.clone() },
            None => BackendKind::Memory,
        };

        StoreOptions {
            backend,
            max_entries: self.max_entries,
            eviction_percent: self.eviction_percent,
            connect_timeout: Duration::from_millis(self.redis_connect_timeout_ms),
        }
    }

    /// Retry settings for mailbox reads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_connect_timeout_ms: 2000,
            max_entries: 1000,
            eviction_percent: 10,
            ttl: TtlPolicy::default(),
            search_policy: SearchCachePolicy::default(),
            pool_max_size: 5,
            batch_size: 10,
            retry_max_attempts: 3,
            retry_base_delay_ms: 100,
            prefetch_top_k: 3,
            server_port: 3000,
            cleanup_interval: 60,
            account: "default".to_string(),
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
