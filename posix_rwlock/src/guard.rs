//! Scoped acquisition on top of the explicit lock/unlock protocol.
//!
//! A guard releases its lock when dropped. Guards cannot leave the acquiring thread, since the
//! OS requires the same thread to release the lock.

use crate::error::RWLockError;
use crate::lock::RwLock;
use std::marker::PhantomData;

/// RAII guard for the shared read lock
#[must_use = "the read lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RwLockReadGuard<'a> {
    lock: &'a RwLock,
    _not_send: PhantomData<*const ()>,
}

/// RAII guard for the exclusive write lock
#[must_use = "the write lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RwLockWriteGuard<'a> {
    lock: &'a RwLock,
    _not_send: PhantomData<*const ()>,
}

impl RwLock {
    /// Blocks until the read lock is held and returns a guard releasing it
    pub fn read(&self) -> Result<RwLockReadGuard<'_>, RWLockError> {
        self.read_lock()?;
        Ok(RwLockReadGuard::new(self))
    }

    /// Returns a guard if the read lock could be taken without waiting
    pub fn try_read(&self) -> Result<Option<RwLockReadGuard<'_>>, RWLockError> {
        Ok(self.try_read_lock()?.then(|| RwLockReadGuard::new(self)))
    }

    /// Blocks until the write lock is held and returns a guard releasing it
    pub fn write(&self) -> Result<RwLockWriteGuard<'_>, RWLockError> {
        self.write_lock()?;
        Ok(RwLockWriteGuard::new(self))
    }

    /// Returns a guard if the write lock could be taken without waiting
    pub fn try_write(&self) -> Result<Option<RwLockWriteGuard<'_>>, RWLockError> {
        Ok(self.try_write_lock()?.then(|| RwLockWriteGuard::new(self)))
    }
}

impl<'a> RwLockReadGuard<'a> {
    fn new(lock: &'a RwLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Releases the lock now, reporting a failure instead of logging it
    pub fn unlock(self) -> Result<(), RWLockError> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.unlock()
    }
}

impl<'a> RwLockWriteGuard<'a> {
    fn new(lock: &'a RwLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Releases the lock now, reporting a failure instead of logging it
    pub fn unlock(self) -> Result<(), RWLockError> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.unlock()
    }
}

impl Drop for RwLockReadGuard<'_> {
    fn drop(&mut self) {
        release(self.lock)
    }
}

impl Drop for RwLockWriteGuard<'_> {
    fn drop(&mut self) {
        release(self.lock)
    }
}

fn release(lock: &RwLock) {
    if let Err(err) = lock.unlock() {
        log::error!(target: "posix_rwlock", "Guard failed to release {lock:?}: {err}");
    }
}
