//! Concurrency-bounded batch execution.
//!
//! Two distinct knobs meet here: batching controls payload size per
//! generation call, the concurrency limit controls how many calls are in
//! flight at once. `run_bounded` guarantees result placement (`result[i]`
//! corresponds to `input[i]`) but says nothing about completion order, and
//! the first failing unit aborts the whole operation.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Partition `items` into fixed-size batches, preserving order.
///
/// Yields `ceil(N / size)` batches, each of at most `size` items, covering
/// every input exactly once. A `size` of zero is treated as 1.
pub fn into_batches<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut batch = Vec::with_capacity(size);
    for item in items {
        batch.push(item);
        if batch.len() == size {
            batches.push(std::mem::replace(&mut batch, Vec::with_capacity(size)));
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

/// Run `work` once per item with at most `limit` invocations in flight.
///
/// Results are placed in input order. Fails fast: the first unit error is
/// returned and the remaining in-flight units are dropped; no partial
/// success list is produced. A `limit` of zero is treated as 1.
pub async fn run_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    limit: usize,
    work: F,
) -> Result<Vec<R>, E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    stream::iter(items.into_iter().map(work))
        .buffered(limit.max(1))
        .try_collect()
        .await
}
