//! Open-ended FIFO work queue with a close signal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "concurrency::queue";

struct QueueState<T> {
    items: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<Option<T>>>,
    closed: bool,
}

/// Unbounded multi-producer, multi-consumer queue.
///
/// Consumers suspended in [`AsyncQueue::next`] are served strictly in the
/// order they started waiting. [`AsyncQueue::close`] stops new pushes and
/// releases waiting consumers; items already buffered are still delivered
/// before consumers observe the end of the queue.
///
/// A waiter dropped before the hand-off does not lose anything: the item is
/// offered to the next waiter or buffered. Once an item has been sent to a
/// waiter, dropping that `next()` future unpolled drops the item with it.
pub struct AsyncQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Enqueue an item, handing it straight to the oldest waiter if any.
    ///
    /// Returns `false` (and drops the item) once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "push");
        if state.closed {
            return false;
        }

        let mut item = item;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Some(item)) {
                Ok(()) => return true,
                Err(returned) => {
                    // Receiver dropped; `send` hands the value back.
                    item = match returned {
                        Some(value) => value,
                        None => return true,
                    };
                }
            }
        }

        state.items.push_back(item);
        true
    }

    /// Stop accepting items and wake every waiting consumer with "done".
    pub fn close(&self) {
        let waiters = {
            let mut state = mutex_lock(&self.state, SOURCE, "close");
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(None);
        }
    }

    /// Wait for the next item. `None` means the queue is closed and drained.
    pub async fn next(&self) -> Option<T> {
        let receiver = {
            let mut state = mutex_lock(&self.state, SOURCE, "next");
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        receiver.await.unwrap_or(None)
    }

    /// Number of buffered, undelivered items.
    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        mutex_lock(&self.state, SOURCE, "is_closed").closed
    }

    /// Number of consumers currently suspended in `next()`.
    pub fn waiting(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "waiting").waiters.len()
    }
}
