//! Performance Module
//!
//! Utilities that shape access to the slow upstream mailbox: batching,
//! call-rate shaping, retry, pooling, request coalescing and prefetch
//! scoring. None of them know about the cache.

mod batch;
mod debounce;
mod dedupe;
mod pool;
mod prefetch;
mod retry;

pub use batch::process_in_batches;
pub use debounce::{Debouncer, Throttle};
pub use dedupe::RequestDeduplicator;
pub use pool::{ConnectionManager, ConnectionPool, PoolStatus, PooledConnection};
pub use prefetch::{AccessTracker, PrefetchScorer, PrefetchWeights};
pub use retry::RetryPolicy;
