//! Owner of one heap-pinned `pthread_rwlock_t`.
//!
//! The primitive must not move after `pthread_rwlock_init`, so it lives in its own heap
//! allocation for its whole life. Each method is exactly one native call and returns the raw
//! result code; interpretation of those codes belongs to [`crate::operation`].

use std::io;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr::{self, NonNull};

type RawRwLock = libc::pthread_rwlock_t;

pub(crate) struct NativeRwLock {
    handle: NonNull<RawRwLock>,
}

// SAFETY: pthread rwlocks are designed to be operated on concurrently from any thread.
// The handle is never moved or freed while a `&NativeRwLock` exists.
unsafe impl Send for NativeRwLock {}
unsafe impl Sync for NativeRwLock {}

impl NativeRwLock {
    /// Allocates and initializes the primitive with default attributes
    pub(crate) fn new() -> io::Result<Self> {
        let storage = Box::leak(Box::new(MaybeUninit::<RawRwLock>::uninit()));
        let handle = NonNull::from(storage).cast::<RawRwLock>();

        // SAFETY: `handle` points at writable, properly aligned, uninitialized storage
        let code = unsafe { libc::pthread_rwlock_init(handle.as_ptr(), ptr::null()) };
        if code != 0 {
            // SAFETY: init failed, so the storage holds no primitive and came from `Box::leak`
            unsafe { free_storage(handle) };
            return Err(io::Error::from_raw_os_error(code));
        }

        Ok(Self { handle })
    }

    pub(crate) fn read(&self) -> libc::c_int {
        // SAFETY: the primitive is initialized and not yet destroyed
        unsafe { libc::pthread_rwlock_rdlock(self.handle.as_ptr()) }
    }

    pub(crate) fn try_read(&self) -> libc::c_int {
        // SAFETY: see `read`
        unsafe { libc::pthread_rwlock_tryrdlock(self.handle.as_ptr()) }
    }

    pub(crate) fn write(&self) -> libc::c_int {
        // SAFETY: see `read`
        unsafe { libc::pthread_rwlock_wrlock(self.handle.as_ptr()) }
    }

    pub(crate) fn try_write(&self) -> libc::c_int {
        // SAFETY: see `read`
        unsafe { libc::pthread_rwlock_trywrlock(self.handle.as_ptr()) }
    }

    pub(crate) fn unlock(&self) -> libc::c_int {
        // SAFETY: see `read`
        unsafe { libc::pthread_rwlock_unlock(self.handle.as_ptr()) }
    }

    /// Destroys the primitive and frees its storage. If the OS refuses, the storage is
    /// leaked instead of freed, since the primitive may still be referenced.
    pub(crate) fn destroy(self) -> io::Result<()> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `self` was consumed, so nothing else can reach the handle
        unsafe { destroy_and_free(this.handle) }
    }

    /// Gives up the primitive without destroying it. The storage is leaked.
    pub(crate) fn abandon(self) {
        let _ = ManuallyDrop::new(self);
    }
}

impl Drop for NativeRwLock {
    fn drop(&mut self) {
        // SAFETY: we are being dropped, so nothing else can reach the handle
        if let Err(err) = unsafe { destroy_and_free(self.handle) } {
            log::warn!(target: "posix_rwlock", "Leaking native rwlock that failed to destroy: {err}");
        }
    }
}

/// # Safety
///
/// `handle` must point at an initialized primitive allocated by [`NativeRwLock::new`] that
/// nothing will touch again.
unsafe fn destroy_and_free(handle: NonNull<RawRwLock>) -> io::Result<()> {
    let code = libc::pthread_rwlock_destroy(handle.as_ptr());
    if code != 0 {
        return Err(io::Error::from_raw_os_error(code));
    }

    free_storage(handle);
    Ok(())
}

/// # Safety
///
/// `handle` must come from the `Box::leak` in [`NativeRwLock::new`] and hold no live primitive.
unsafe fn free_storage(handle: NonNull<RawRwLock>) {
    drop(Box::from_raw(handle.cast::<MaybeUninit<RawRwLock>>().as_ptr()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_calls_follow_posix_codes() {
        let native = NativeRwLock::new().unwrap();
        assert_eq!(native.read(), 0);
        assert_eq!(native.try_read(), 0);
        assert_eq!(native.try_write(), libc::EBUSY);
        assert_eq!(native.unlock(), 0);
        assert_eq!(native.unlock(), 0);

        assert_eq!(native.write(), 0);
        assert_eq!(native.try_read(), libc::EBUSY);
        assert_eq!(native.unlock(), 0);
        native.destroy().unwrap();
    }

    #[test]
    fn dropping_an_unlocked_primitive_destroys_it() {
        let native = NativeRwLock::new().unwrap();
        assert_eq!(native.try_write(), 0);
        assert_eq!(native.unlock(), 0);
        drop(native);
    }
}
