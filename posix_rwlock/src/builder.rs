//! Configuration for [`RwLock`] construction.
//!
//! Lock attributes (process-shared, kind preferences) are intentionally not exposed; the lock is
//! always created with the OS defaults. What can be configured is how the lock identifies itself
//! in logs and how blocking waits cooperate with the host runtime.
//!
//! # Example
//! ```rust
//! use posix_rwlock::prelude::*;
//! use std::sync::Arc;
//!
//! let host = Arc::new(CooperativeLock::new());
//! let lock = RwLockBuilder::default()
//!     .with_name("config")
//!     .with_scheduler(host.clone())
//!     .build()?;
//! # Ok::<(), RWLockError>(())
//! ```

use crate::error::RWLockError;
use crate::lock::RwLock;
use crate::scheduler::{HostScheduler, NativeThreads};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Used to construct a configured [`RwLock`]
#[derive(Clone, Default)]
pub struct RwLockBuilder {
    name: Option<String>,
    scheduler: Option<Arc<dyn HostScheduler>>,
}

impl RwLockBuilder {
    /// Names the lock in log output
    pub fn with_name<T: Into<String>>(&mut self, name: T) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the hook that yields host scheduling control during blocking acquisitions.
    /// Defaults to [`NativeThreads`]
    pub fn with_scheduler<S: HostScheduler + 'static>(&mut self, scheduler: S) -> &mut Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Initializes the native primitive. Fails with [`RWLockError::Initialization`] if the
    /// OS cannot provide one
    pub fn build(&self) -> Result<RwLock, RWLockError> {
        let scheduler = self
            .scheduler
            .clone()
            .unwrap_or_else(|| Arc::new(NativeThreads));
        RwLock::from_parts(self.name.clone(), scheduler)
    }
}

impl Debug for RwLockBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLockBuilder")
            .field("name", &self.name)
            .field("custom_scheduler", &self.scheduler.is_some())
            .finish()
    }
}
