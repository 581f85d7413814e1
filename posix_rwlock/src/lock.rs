//! The reader/writer lock.
//!
//! # State machine
//!
//! The real state lives in the OS primitive; from the outside it is one of
//!
//! * `UNLOCKED` - initial state, and the only state the lock may be destroyed from
//! * `READ_LOCKED(n)` - `n >= 1` threads hold the shared lock
//! * `WRITE_LOCKED` - one thread holds the exclusive lock
//!
//! A read acquisition succeeds from `UNLOCKED` or `READ_LOCKED`; a write acquisition only from
//! `UNLOCKED`. Otherwise blocking calls wait and try calls return `false`. [`RwLock::unlock`]
//! undoes whichever acquisition the calling thread made.
//!
//! # Important Notes
//!
//! * The OS requires that a lock is released by the thread that acquired it
//! * Acquiring again in a conflicting mode from a thread that already holds the lock is
//!   undefined by the OS primitive and must be avoided by callers
//! * No fairness between readers and writers is promised beyond what the OS does

use crate::builder::RwLockBuilder;
use crate::error::RWLockError;
use crate::ledger;
use crate::native::NativeRwLock;
use crate::operation::{self, Operation};
use crate::scheduler::HostScheduler;
use std::fmt::{Debug, Formatter};
use std::io;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(0);

/// A reader/writer lock backed by the native `pthread_rwlock_t`.
///
/// Share it between threads with an [`Arc`]. Each thread acquires with one of the `*_lock`
/// methods and later calls [`unlock`](Self::unlock), or uses the guard-returning
/// [`read`](Self::read) / [`write`](Self::write) family.
///
/// # Example
///
/// ```rust
/// use posix_rwlock::RwLock;
///
/// let lock = RwLock::new()?;
/// lock.read_lock()?;
/// assert!(!lock.try_write_lock()?);
/// lock.unlock()?;
/// assert!(lock.try_write_lock()?);
/// lock.unlock()?;
/// lock.close()?;
/// # Ok::<(), posix_rwlock::RWLockError>(())
/// ```
pub struct RwLock {
    native: ManuallyDrop<NativeRwLock>,
    torn_down: bool,
    id: u64,
    name: Option<String>,
    scheduler: Arc<dyn HostScheduler>,
    holds: AtomicUsize,
}

impl RwLock {
    /// Creates a lock in the `UNLOCKED` state with the default configuration
    pub fn new() -> Result<Self, RWLockError> {
        RwLockBuilder::default().build()
    }

    /// Returns a builder for configuring the lock before construction
    pub fn builder() -> RwLockBuilder {
        RwLockBuilder::default()
    }

    pub(crate) fn from_parts(
        name: Option<String>,
        scheduler: Arc<dyn HostScheduler>,
    ) -> Result<Self, RWLockError> {
        let native = NativeRwLock::new().map_err(RWLockError::Initialization)?;
        let id = NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(target: "posix_rwlock", "Created RWLock {}", Label(id, name.as_deref()));

        Ok(Self {
            native: ManuallyDrop::new(native),
            torn_down: false,
            id,
            name,
            scheduler,
            holds: AtomicUsize::new(0),
        })
    }

    /// Blocks until the shared read lock is held
    pub fn read_lock(&self) -> Result<(), RWLockError> {
        self.operate(Operation::Read, true).map(|_| ())
    }

    /// Takes the shared read lock if no writer holds it. Returns `false` without waiting
    /// otherwise.
    pub fn try_read_lock(&self) -> Result<bool, RWLockError> {
        self.operate(Operation::Read, false)
    }

    /// Blocks until the exclusive write lock is held
    pub fn write_lock(&self) -> Result<(), RWLockError> {
        self.operate(Operation::Write, true).map(|_| ())
    }

    /// Takes the exclusive write lock if nobody holds the lock. Returns `false` without
    /// waiting otherwise.
    pub fn try_write_lock(&self) -> Result<bool, RWLockError> {
        self.operate(Operation::Write, false)
    }

    /// Releases the lock the calling thread holds, read or write.
    ///
    /// Fails with `EPERM` if the calling thread holds no lock on this instance.
    pub fn unlock(&self) -> Result<(), RWLockError> {
        self.operate(Operation::Unlock, false).map(|_| ())
    }

    /// Runs `operation`, waiting for the lock if `blocking` is set.
    ///
    /// Returns `Ok(false)` only when a non-blocking acquisition finds the lock held in a
    /// conflicting mode. `blocking` has no effect on [`Operation::Unlock`].
    pub fn operate(&self, operation: Operation, blocking: bool) -> Result<bool, RWLockError> {
        if operation == Operation::Unlock && !ledger::may_release(self.id) {
            log::trace!(target: "posix_rwlock", "{} unlock refused: not held by this thread", self.label());
            return Err(RWLockError::lock(operation, libc::EPERM));
        }

        log::trace!(target: "posix_rwlock", "{} {operation} (blocking: {blocking})", self.label());
        let result = operation::dispatch(&self.native, &*self.scheduler, operation, blocking);

        match &result {
            Ok(true) if operation.is_acquire() => {
                self.holds.fetch_add(1, Ordering::AcqRel);
                ledger::record_acquire(self.id);
            }
            Ok(true) => {
                if self
                    .holds
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |holds| {
                        holds.checked_sub(1)
                    })
                    .is_err()
                {
                    log::warn!(target: "posix_rwlock", "{} released with no hold counted", self.label());
                }
                ledger::record_release(self.id);
            }
            Ok(false) => {
                log::trace!(target: "posix_rwlock", "{} {operation} would block", self.label())
            }
            Err(err) => log::trace!(target: "posix_rwlock", "{} {err}", self.label()),
        }

        result
    }

    /// The diagnostic name given at construction, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Destroys the native primitive and reports the outcome.
    ///
    /// If any thread still holds the lock the primitive is not destroyed and
    /// [`RWLockError::Destruction`] with `EBUSY` is returned; the same error kind is returned
    /// if the OS refuses to destroy it. In both cases the storage is leaked, never freed.
    pub fn close(mut self) -> Result<(), RWLockError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), RWLockError> {
        if self.torn_down {
            return Ok(());
        }

        self.torn_down = true;
        // SAFETY: `torn_down` guarantees this runs once, and only from `close` or `drop`,
        // after which the native handle is never used again
        let native = unsafe { ManuallyDrop::take(&mut self.native) };
        let holds = *self.holds.get_mut();

        if holds != 0 {
            native.abandon();
            return Err(RWLockError::Destruction(io::Error::from_raw_os_error(
                libc::EBUSY,
            )));
        }

        native.destroy().map_err(RWLockError::Destruction)?;
        log::debug!(target: "posix_rwlock", "Destroyed RWLock {}", self.label());
        Ok(())
    }

    fn label(&self) -> Label<'_> {
        Label(self.id, self.name.as_deref())
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            log::warn!(target: "posix_rwlock", "Leaking RWLock {}: {err}", self.label());
        }
    }
}

impl Debug for RwLock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("holds", &self.holds.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

struct Label<'a>(u64, Option<&'a str>);

impl std::fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.1 {
            Some(name) => write!(f, "#{} ({name})", self.0),
            None => write!(f, "#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::time::Duration;

    fn setup_log() {
        posix_rwlock_logging::setup_log_no_panic_hook();
    }

    #[test]
    fn unlock_without_acquire_is_eperm() {
        setup_log();
        let lock = RwLock::new().unwrap();
        let err = lock.unlock().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));
        assert!(matches!(
            err,
            RWLockError::Lock {
                operation: Operation::Unlock,
                ..
            }
        ));
        lock.close().unwrap();
    }

    #[test]
    fn double_unlock_is_refused() {
        setup_log();
        let lock = RwLock::new().unwrap();
        lock.write_lock().unwrap();
        lock.unlock().unwrap();
        assert_eq!(lock.unlock().unwrap_err().raw_os_error(), Some(libc::EPERM));
        lock.close().unwrap();
    }

    #[test]
    fn close_refuses_while_held() {
        setup_log();
        let lock = RwLock::new().unwrap();
        lock.read_lock().unwrap();
        let err = lock.close().unwrap_err();
        assert!(matches!(err, RWLockError::Destruction(_)));
        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));
    }

    #[test]
    fn dropping_a_held_lock_only_logs() {
        setup_log();
        let lock = RwLock::new().unwrap();
        lock.write_lock().unwrap();
        drop(lock);
    }

    #[test]
    fn operate_covers_all_operations() {
        setup_log();
        let lock = RwLock::builder().with_name("operate").build().unwrap();
        assert_eq!(lock.name(), Some("operate"));
        assert!(lock.operate(Operation::Read, true).unwrap());
        assert!(lock.operate(Operation::Unlock, true).unwrap());
        assert!(lock.operate(Operation::Write, false).unwrap());
        assert!(lock.operate(Operation::Unlock, false).unwrap());
        lock.close().unwrap();
    }

    #[test]
    fn unlock_from_another_thread_is_refused() {
        setup_log();
        let lock = Arc::new(RwLock::new().unwrap());
        lock.write_lock().unwrap();

        let lock2 = lock.clone();
        let result = std::thread::spawn(move || lock2.unlock().map_err(|e| e.raw_os_error()))
            .join()
            .unwrap();
        assert_eq!(result, Err(Some(libc::EPERM)));

        lock.unlock().unwrap();
    }

    #[test]
    fn blocked_writer_proceeds_after_release() {
        setup_log();
        let lock = Arc::new(RwLock::new().unwrap());
        lock.read_lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let lock2 = lock.clone();
        let writer = std::thread::spawn(move || {
            tx.send("waiting").unwrap();
            lock2.write_lock().unwrap();
            tx.send("acquired").unwrap();
            lock2.unlock().unwrap();
        });

        assert_eq!(rx.recv().unwrap(), "waiting");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        lock.unlock().unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "acquired"
        );
        writer.join().unwrap();
    }

    struct SkipsWait;

    impl HostScheduler for SkipsWait {
        fn run_blocking(&self, _wait: &mut dyn FnMut()) {}
    }

    #[test]
    fn skipped_wait_counts_no_hold() {
        setup_log();
        let lock = RwLock::builder().with_scheduler(SkipsWait).build().unwrap();
        let err = lock.write_lock().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        let lock = Arc::new(lock);
        let lock2 = lock.clone();
        let elsewhere = std::thread::spawn(move || {
            let acquired = lock2.try_write_lock().unwrap();
            lock2.unlock().unwrap();
            acquired
        })
        .join()
        .unwrap();
        assert!(elsewhere);

        assert_eq!(lock.unlock().unwrap_err().raw_os_error(), Some(libc::EPERM));
        Arc::try_unwrap(lock).unwrap().close().unwrap();
    }

    struct UnlockOnExit(Arc<RwLock>, mpsc::Sender<Option<i32>>);

    impl Drop for UnlockOnExit {
        fn drop(&mut self) {
            let outcome = self.0.unlock().err().and_then(|err| err.raw_os_error());
            let _ = self.1.send(outcome);
        }
    }

    thread_local! {
        static ON_EXIT: RefCell<Option<UnlockOnExit>> = const { RefCell::new(None) };
    }

    // thread-local destructors run in reverse order of first use on linux
    #[cfg(target_os = "linux")]
    #[test]
    fn unlock_after_ledger_teardown_is_refused() {
        setup_log();
        let lock = Arc::new(RwLock::new().unwrap());
        let (tx, rx) = mpsc::channel();

        let lock2 = lock.clone();
        std::thread::spawn(move || {
            ON_EXIT.with(|slot| *slot.borrow_mut() = Some(UnlockOnExit(lock2.clone(), tx)));
            // first use of the ledger comes after the exit hook, so it is torn down first
            assert!(lock2.try_write_lock().unwrap());
            lock2.unlock().unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Some(libc::EPERM)));
        assert!(format!("{lock:?}").contains("holds: 0"));
        Arc::try_unwrap(lock).unwrap().close().unwrap();
    }
}
