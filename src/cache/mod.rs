//! Cache Module
//!
//! TTL cache for mailbox data: pluggable storage backends, deterministic
//! keys, per-resource TTL policy, and write-driven invalidation.

mod backend;
mod entry;
mod facade;
mod invalidation;
pub mod keys;
mod memory;
mod policy;
mod redis;
mod stats;
mod store;


// Re-export public types
pub use backend::{BackendKind, BackendUsage, CacheBackend, StoreOptions};
pub use entry::CacheEntry;
pub use facade::{Generation, MailCache};
pub use invalidation::InvalidationReport;
pub use keys::{derive_key, ResourceClass};
pub use memory::{MemoryBackend, MemoryStore};
pub use policy::{EmailTtlPolicy, SearchCachePolicy, TtlPolicy};
pub use redis::RedisBackend;
pub use stats::CacheStats;
pub use store::CacheStore;
