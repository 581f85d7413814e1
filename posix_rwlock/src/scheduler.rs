//! Hooks that let the host runtime keep scheduling work while a thread waits on the lock.
//!
//! A blocking acquisition is a genuine OS-level wait. If the calling thread holds a host-wide
//! cooperative lock (an interpreter lock, a runtime worker slot) during that wait, every other
//! logical thread of the host is stuck behind it. A [`HostScheduler`] brackets the native wait
//! and gives that control up for exactly its duration.
//!
//! * [`NativeThreads`] - no cooperative lock exists; the wait runs as-is
//! * [`TokioRuntime`] - hands the current tokio worker's other tasks off while waiting
//! * [`CooperativeLock`] - an interpreter-style global lock released around the wait

use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::ThreadId;

/// Yields host scheduling control for the duration of a blocking native wait
pub trait HostScheduler: Send + Sync {
    /// Runs `wait` to completion. Whatever host-level lock the calling thread holds must be
    /// released before `wait` starts and held again when this returns, including when `wait`
    /// unwinds.
    fn run_blocking(&self, wait: &mut dyn FnMut());
}

impl<T: HostScheduler + ?Sized> HostScheduler for Arc<T> {
    fn run_blocking(&self, wait: &mut dyn FnMut()) {
        (**self).run_blocking(wait)
    }
}

impl<T: HostScheduler + ?Sized> HostScheduler for Box<T> {
    fn run_blocking(&self, wait: &mut dyn FnMut()) {
        (**self).run_blocking(wait)
    }
}

/// For hosts with plain OS threads and no cooperative lock
#[derive(Copy, Clone, Debug, Default)]
pub struct NativeThreads;

impl HostScheduler for NativeThreads {
    fn run_blocking(&self, wait: &mut dyn FnMut()) {
        wait()
    }
}

/// For callers running on tokio worker threads.
///
/// On a multi-thread runtime the wait runs inside [`tokio::task::block_in_place`], which moves
/// the worker's queued tasks to another thread. Outside a runtime, or on a current-thread
/// runtime where that is impossible, the wait runs directly.
#[cfg(feature = "tokio")]
#[derive(Copy, Clone, Debug, Default)]
pub struct TokioRuntime;

#[cfg(feature = "tokio")]
impl HostScheduler for TokioRuntime {
    fn run_blocking(&self, wait: &mut dyn FnMut()) {
        use tokio::runtime::{Handle, RuntimeFlavor};

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(wait)
            }
            _ => wait(),
        }
    }
}

/// A host-wide cooperative lock in the style of an interpreter lock.
///
/// Host threads call [`enter`](Self::enter) before running host work and keep the returned
/// guard while they do. When a thread holding it blocks on a [`RwLock`](crate::RwLock) built
/// with this scheduler, the cooperative lock is released for the duration of the wait so other
/// host threads can enter.
#[derive(Debug, Default)]
pub struct CooperativeLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl CooperativeLock {
    /// Creates a cooperative lock that no thread owns
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the calling thread owns the cooperative lock.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread already owns it.
    pub fn enter(&self) -> CooperativeGuard<'_> {
        self.acquire();
        CooperativeGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Takes the cooperative lock only if nobody owns it
    pub fn try_enter(&self) -> Option<CooperativeGuard<'_>> {
        let mut owner = self.owner.lock();
        if owner.is_some() {
            return None;
        }

        *owner = Some(std::thread::current().id());
        Some(CooperativeGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Whether the calling thread currently owns the cooperative lock
    pub fn is_held_by_current_thread(&self) -> bool {
        *self.owner.lock() == Some(std::thread::current().id())
    }

    fn acquire(&self) {
        let me = std::thread::current().id();
        let mut owner = self.owner.lock();
        assert_ne!(*owner, Some(me), "cooperative lock is not re-entrant");
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        *owner = Some(me);
    }

    fn release(&self) {
        *self.owner.lock() = None;
        self.released.notify_one();
    }
}

impl HostScheduler for CooperativeLock {
    fn run_blocking(&self, wait: &mut dyn FnMut()) {
        if !self.is_held_by_current_thread() {
            return wait();
        }

        log::trace!(target: "posix_rwlock", "Releasing cooperative lock for blocking wait");
        self.release();
        let _reacquire = Reacquire(self);
        wait()
    }
}

struct Reacquire<'a>(&'a CooperativeLock);

impl Drop for Reacquire<'_> {
    fn drop(&mut self) {
        self.0.acquire();
        log::trace!(target: "posix_rwlock", "Reacquired cooperative lock after blocking wait");
    }
}

/// Proof that the current thread owns a [`CooperativeLock`]. Released on drop.
#[derive(Debug)]
pub struct CooperativeGuard<'a> {
    lock: &'a CooperativeLock,
    // ownership is per-thread
    _not_send: PhantomData<*const ()>,
}

impl Drop for CooperativeGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
