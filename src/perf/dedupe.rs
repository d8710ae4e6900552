//! In-flight request coalescing.
//!
//! Concurrent callers asking for the same key share a single execution of
//! the underlying operation and all observe its outcome. The ledger entry is
//! dropped as soon as the operation settles, so later callers start fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type Ledger<T, E> = Arc<Mutex<HashMap<String, SharedResult<T, E>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RequestDeduplicator<T, E> {
    in_flight: Ledger<T, E>,
}

impl<T, E> Default for RequestDeduplicator<T, E> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` for `key`, or joins the execution already in flight
    /// for it. `operation` is only called when nothing is in flight.
    pub async fn dedupe<F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut ledger = lock(&self.in_flight);
            match ledger.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight request {}", key);
                    existing.clone()
                }
                None => {
                    let cleanup = Arc::clone(&self.in_flight);
                    let owned_key = key.to_string();
                    let fut = operation();
                    let shared = async move {
                        let result = fut.await;
                        lock(&cleanup).remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    ledger.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of keys with an execution in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let dedup: Arc<RequestDeduplicator<String, String>> = Arc::new(RequestDeduplicator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    dedup
                        .dedupe("email:1", move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok("body".to_string())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok("body".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_then_forgotten() {
        let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            dedup.dedupe("k", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err("down".to_string())
                }
            }),
            dedup.dedupe("k", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            }),
        );

        assert_eq!(a, Err("down".to_string()));
        assert_eq!(b, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);

        // Settled, so the next call runs again
        let next = dedup.dedupe("k", || async { Ok(7) }).await;
        assert_eq!(next, Ok(7));
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let dedup: RequestDeduplicator<&'static str, ()> = RequestDeduplicator::new();

        let (a, b) = tokio::join!(
            dedup.dedupe("a", || async { Ok("a") }),
            dedup.dedupe("b", || async { Ok("b") }),
        );

        assert_eq!((a, b), (Ok("a"), Ok("b")));
    }
}
