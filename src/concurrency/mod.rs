//! Bounded-concurrency task runners.
//!
//! Everything here runs cooperatively on the calling task: workers are
//! futures polled together, not spawned tasks, so handlers may borrow from
//! the caller.

mod pool;
mod queue;
mod retry;

pub use pool::{run_queue_with_concurrency, run_with_concurrency};
pub use queue::AsyncQueue;
pub use retry::{DEFAULT_BASE_DELAY, RetryPolicy, retry_with_backoff};
