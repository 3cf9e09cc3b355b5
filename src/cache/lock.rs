//! Lock helpers that survive poisoning.
//!
//! A panic while a cache lock is held leaves the data structurally valid (an
//! LRU map or a queue buffer), so callers keep going with the inner value and
//! a warning instead of propagating the panic.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(poisoned: PoisonError<G>, target: &'static str, op: &'static str, kind: &str) -> G {
    warn!(
        op,
        target_module = target,
        lock_kind = kind,
        result = "poisoned_recovered",
        hint = "state may be stale after panic in another thread",
        "Recovered from poisoned lock"
    );
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op, "rwlock.read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op, "rwlock.write"))
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op, "mutex.lock"))
}
