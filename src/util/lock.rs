//! Poisoned-lock recovery.
//!
//! Listener callbacks run user code; a panic in one must not wedge the store
//! behind a poisoned lock. Every acquisition goes through these helpers,
//! which log the recovery once and hand the guard back.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn note_recovery(lock_kind: &'static str, target: &'static str, op: &'static str) {
    warn!(
        op,
        target_module = target,
        lock_kind,
        hint = "state may be stale after a panic in another thread",
        "Recovered from poisoned sync-layer lock"
    );
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        note_recovery("rwlock.read", target, op);
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        note_recovery("rwlock.write", target, op);
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        note_recovery("mutex.lock", target, op);
        poisoned.into_inner()
    })
}
