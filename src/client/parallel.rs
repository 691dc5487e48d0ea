//! Bounded concurrent fan-out over independent tasks.
//!
//! Each task's result is recorded on its own; one failing task never
//! cancels its siblings. Results arrive in completion order.

use std::future::Future;
use std::pin::Pin;

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use crate::error::Result;

/// Type alias for boxed futures used in the fan-out
type TaskFuture<K, T> = Pin<Box<dyn Future<Output = (K, Result<T>)> + Send>>;

/// Outcome of one task, tagged with the key it was started for
#[derive(Debug)]
pub struct TaskOutcome<K, T> {
    pub key: K,
    pub result: Result<T>,
}

/// Run `run_task` for every key with at most `max_concurrent` in flight.
///
/// # Arguments
///
/// * `keys` - One entry per independent task
/// * `run_task` - Async function that runs a single task
/// * `max_concurrent` - Maximum number of tasks in flight (at least 1)
///
/// # Example
///
/// ```ignore
/// let outcomes = fan_out(
///     partitions,
///     |partition| {
///         let c = client.clone();
///         async move { collect_partition(&*c, &partition).await }
///     },
///     8,
/// ).await;
/// ```
pub async fn fan_out<K, T, F, Fut>(
    keys: Vec<K>,
    run_task: F,
    max_concurrent: usize,
) -> Vec<TaskOutcome<K, T>>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    if keys.is_empty() {
        return Vec::new();
    }

    let max_concurrent = max_concurrent.max(1);
    debug!(
        "Running {} tasks with max {} concurrent",
        keys.len(),
        max_concurrent
    );

    let mut outcomes = Vec::with_capacity(keys.len());
    let mut futures: FuturesUnordered<TaskFuture<K, T>> = FuturesUnordered::new();
    let mut pending = keys.into_iter();

    let make_future = |key: K, f: &F| -> TaskFuture<K, T> {
        let fut = f(key.clone());
        Box::pin(async move {
            let result = fut.await;
            (key, result)
        })
    };

    for key in pending.by_ref().take(max_concurrent) {
        futures.push(make_future(key, &run_task));
    }

    // Keep the window full as tasks finish
    while let Some((key, result)) = futures.next().await {
        outcomes.push(TaskOutcome { key, result });

        if let Some(next) = pending.next() {
            futures.push(make_future(next, &run_task));
        }
    }

    debug!("Fan-out finished: {} tasks", outcomes.len());
    outcomes
}
