use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

use super::queue::AsyncQueue;

/// Clamp a requested worker count to `1..=len` (or at least 1 for open queues).
fn worker_count(limit: usize, len: Option<usize>) -> usize {
    let workers = limit.max(1);
    match len {
        Some(len) => workers.min(len.max(1)),
        None => workers,
    }
}

/// Run `handler` once per item with at most `limit` invocations in flight.
///
/// The first handler error is returned immediately; handlers still in flight
/// at that point are dropped. Completion order is unspecified.
pub async fn run_with_concurrency<T, E, F, Fut>(
    items: Vec<T>,
    limit: usize,
    handler: F,
) -> Result<(), E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    if items.is_empty() {
        return Ok(());
    }

    let workers = worker_count(limit, Some(items.len()));
    stream::iter(items.into_iter().map(Ok::<T, E>))
        .try_for_each_concurrent(Some(workers), handler)
        .await
}

/// Drain `queue` with `max(1, limit)` workers until it is closed and empty.
///
/// Each worker loops on [`AsyncQueue::next`]. A handler error stops the run
/// and is returned; the queue itself is left as-is.
pub async fn run_queue_with_concurrency<T, E, F, Fut>(
    queue: &AsyncQueue<T>,
    limit: usize,
    handler: F,
) -> Result<(), E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let workers = worker_count(limit, None);
    let handler = &handler;

    stream::iter(0..workers)
        .map(|_| async move {
            while let Some(item) = queue.next().await {
                handler(item).await?;
            }
            Ok::<(), E>(())
        })
        .buffer_unordered(workers)
        .try_collect::<Vec<()>>()
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(worker_count(0, Some(5)), 1);
        assert_eq!(worker_count(8, Some(3)), 3);
        assert_eq!(worker_count(2, Some(6)), 2);
        assert_eq!(worker_count(0, None), 1);
        assert_eq!(worker_count(4, None), 4);
    }

    #[tokio::test]
    async fn empty_input_finishes_without_calls() {
        let calls = AtomicUsize::new(0);
        run_with_concurrency(Vec::<u32>::new(), 4, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), ()>(()) }
        })
        .await
        .expect("no errors");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_error_aborts_the_batch() {
        let seen = Arc::new(AtomicUsize::new(0));
        let result = run_with_concurrency((0..10).collect(), 1, |item: u32| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if item == 2 { Err(format!("boom at {item}")) } else { Ok(()) }
            }
        })
        .await;

        assert_eq!(result, Err("boom at 2".to_string()));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn queue_runner_stops_on_handler_error() {
        let queue = AsyncQueue::new();
        queue.push(1);
        queue.push(2);
        queue.close();

        let result = run_queue_with_concurrency(&queue, 1, |item: u32| async move {
            if item == 1 { Err("first failed") } else { Ok(()) }
        })
        .await;

        assert_eq!(result, Err("first failed"));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn queue_runner_waits_for_late_pushes() {
        let queue = AsyncQueue::new();
        let total = AtomicUsize::new(0);

        let producer = {
            let queue = queue.clone();
            async move {
                for value in 1..=4 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    queue.push(value);
                }
                queue.close();
            }
        };
        let consumer = run_queue_with_concurrency(&queue, 3, |value: usize| {
            total.fetch_add(value, Ordering::SeqCst);
            async { Ok::<(), ()>(()) }
        });

        let ((), result) = tokio::join!(producer, consumer);
        result.expect("no errors");
        assert_eq!(total.load(Ordering::SeqCst), 10);
    }
}
