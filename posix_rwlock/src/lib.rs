//! # posix_rwlock
//!
//! A reader/writer lock that hands all mutual exclusion to the operating system's native
//! `pthread_rwlock_t`, and adds only what a managed host needs on top: a blocking /
//! non-blocking acquisition protocol, translation of OS result codes into errors carrying the
//! OS's own description, and release of host scheduling control while a thread waits.
//!
//! ## Features
//!
//! - **Pass-through semantics**: many readers or one writer, exactly as the OS implements it
//! - **Try-acquisition**: busy is a normal `false` outcome, never an error
//! - **Host-aware blocking**: a [`HostScheduler`] yields the host's cooperative lock (or tokio
//!   worker) for the duration of each blocking wait
//! - **Checked release**: unlocking from a thread that holds nothing fails with `EPERM`
//! - **Checked destruction**: a lock still held at teardown is leaked and reported, never
//!   destroyed underneath its holders
//!
//! ## Example
//!
//! ```rust
//! use posix_rwlock::prelude::*;
//! use std::sync::Arc;
//!
//! let lock = Arc::new(RwLock::new()?);
//! lock.write_lock()?;
//!
//! let reader = lock.clone();
//! let acquired = std::thread::spawn(move || reader.try_read_lock()).join().unwrap()?;
//! assert!(!acquired);
//!
//! lock.unlock()?;
//! # Ok::<(), RWLockError>(())
//! ```
//!
//! ## Important Notes
//!
//! - Only unix targets are supported
//! - A lock must be released by the thread that acquired it
//! - There is no timed or cancellable acquisition
//! - Logging goes through the `log` facade under the `posix_rwlock` target

#[cfg(not(target_family = "unix"))]
compile_error!("posix_rwlock wraps pthread_rwlock_t and only supports unix targets");

pub mod builder;
pub mod error;
pub mod guard;
mod ledger;
pub mod lock;
mod native;
pub mod operation;
pub mod scheduler;

pub use builder::RwLockBuilder;
pub use error::RWLockError;
pub use guard::{RwLockReadGuard, RwLockWriteGuard};
pub use lock::RwLock;
pub use operation::Operation;

pub mod prelude {
    pub use crate::builder::RwLockBuilder;
    pub use crate::error::RWLockError;
    pub use crate::guard::{RwLockReadGuard, RwLockWriteGuard};
    pub use crate::lock::RwLock;
    pub use crate::operation::Operation;
    #[cfg(feature = "tokio")]
    pub use crate::scheduler::TokioRuntime;
    pub use crate::scheduler::{CooperativeGuard, CooperativeLock, HostScheduler, NativeThreads};
}
