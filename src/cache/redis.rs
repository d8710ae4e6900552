//! Redis Backend Module
//!
//! Shared external store. Expiry is delegated to Redis (`SET ... EX`), and
//! pattern invalidation walks the keyspace with `SCAN MATCH`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::cache::backend::{BackendUsage, CacheBackend};
use crate::error::CacheError;

/// Prefix applied to every key written by this service.
pub const KEY_PREFIX: &str = "mailbox_cache:";

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

// == Redis Backend ==
pub struct RedisBackend {
    conn: MultiplexedConnection,
}

impl RedisBackend {
    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn prefixed(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// Collects every key matching an already prefixed glob.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::prefixed(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::prefixed(key), value, ttl_seconds.max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let deleted: usize = conn.del(Self::prefixed(key)).await?;
        Ok(deleted > 0)
    }

    async fn clear_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let keys = self.scan(&Self::prefixed(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let mut removed = 0;
        for chunk in keys.chunks(SCAN_COUNT) {
            let deleted: usize = conn.del(chunk.to_vec()).await?;
            removed += deleted;
        }
        Ok(removed)
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        // Redis expires keys natively
        Ok(0)
    }

    async fn usage(&self) -> Result<BackendUsage, CacheError> {
        let size = self.scan(&format!("{KEY_PREFIX}*")).await?.len();

        let mut conn = self.conn.clone();
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await?;

        Ok(BackendUsage {
            size,
            memory_usage_bytes: parse_used_memory(&info).unwrap_or_default(),
            evictions: 0,
        })
    }
}

/// Extracts `used_memory` from an `INFO memory` reply.
fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|value| value.trim().parse().ok())
}
