//! Lock access that survives poisoning: a panicked writer leaves the map in a
//! usable state because every write is a whole-entry insert.

use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), owner, op, "read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), owner, op, "write")
}

fn recover<G>(
    result: LockResult<G>,
    owner: &'static str,
    op: &'static str,
    mode: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = "precache::lock",
            owner,
            op,
            mode,
            "lock poisoned, continuing with inner value"
        );
        poisoned.into_inner()
    })
}
