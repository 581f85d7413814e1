//! Per-thread count of holds on each lock.
//!
//! The native unlock does not have to check that the caller holds anything (glibc does not),
//! and releasing an unheld primitive corrupts it. The ledger lets `unlock` refuse with `EPERM`
//! first. It is thread-local, so it adds no shared state, and it never records whether a
//! hold is shared or exclusive.

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static HOLDS: RefCell<HashMap<u64, usize>> = RefCell::new(HashMap::new());
}

/// Records one more hold by the current thread on lock `id`
pub(crate) fn record_acquire(id: u64) {
    if HOLDS
        .try_with(|holds| *holds.borrow_mut().entry(id).or_insert(0) += 1)
        .is_err()
    {
        log::warn!(target: "posix_rwlock", "Hold on RWLock #{id} acquired during thread teardown is not recorded");
    }
}

/// Removes one hold by the current thread on lock `id`
pub(crate) fn record_release(id: u64) {
    let recorded = HOLDS.try_with(|holds| {
        let mut holds = holds.borrow_mut();
        if let Some(count) = holds.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                holds.remove(&id);
            }
        }
    });

    if recorded.is_err() {
        log::warn!(target: "posix_rwlock", "Release of RWLock #{id} during thread teardown is not recorded");
    }
}

/// Whether the current thread may release lock `id`.
///
/// During thread-local teardown the ledger is gone and ownership cannot be proven, so the
/// release is refused.
pub(crate) fn may_release(id: u64) -> bool {
    HOLDS
        .try_with(|holds| holds.borrow().contains_key(&id))
        .unwrap_or(false)
}
