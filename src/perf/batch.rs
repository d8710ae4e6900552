//! Chunked fan-out.

use std::future::Future;

use futures::future::join_all;

/// Runs `operation` over `items` in chunks of `batch_size`, waiting for a
/// whole chunk before starting the next.
///
/// At most `batch_size` operations are in flight at once, and results come
/// back in input order.
pub async fn process_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut operation: F,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
        let chunk: Vec<Fut> = items.by_ref().take(batch_size).map(&mut operation).collect();
        results.extend(join_all(chunk).await);
    }

    results
}
