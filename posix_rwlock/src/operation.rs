//! Single-point dispatch of lock operations onto the native primitive.
//!
//! Read and write acquisition share one code path parameterized by `blocking`; the only
//! difference between acquire and try-acquire is which native call is made and whether
//! `EBUSY` is an outcome or an error.

use crate::error::RWLockError;
use crate::native::NativeRwLock;
use crate::scheduler::HostScheduler;
use std::fmt::{Display, Formatter};

/// The operations a [`RwLock`](crate::RwLock) accepts
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// Acquire the shared read lock
    Read,
    /// Acquire the exclusive write lock
    Write,
    /// Release whichever lock the calling thread holds
    Unlock,
}

impl Operation {
    /// The compact single-character code host bindings use for this operation
    pub fn code(self) -> char {
        match self {
            Operation::Read => 'r',
            Operation::Write => 'w',
            Operation::Unlock => 'u',
        }
    }

    /// Whether this operation acquires the lock
    pub fn is_acquire(self) -> bool {
        !matches!(self, Operation::Unlock)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Read => write!(f, "read-lock"),
            Operation::Write => write!(f, "write-lock"),
            Operation::Unlock => write!(f, "unlock"),
        }
    }
}

impl TryFrom<char> for Operation {
    type Error = RWLockError;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        match code {
            'r' => Ok(Operation::Read),
            'w' => Ok(Operation::Write),
            'u' => Ok(Operation::Unlock),
            other => Err(RWLockError::UnknownOperation(other)),
        }
    }
}

/// Performs exactly one native call for `operation` and translates its result.
///
/// Returns `Ok(true)` when the operation took effect and `Ok(false)` only for a
/// non-blocking acquisition that found the lock held in a conflicting mode. `blocking`
/// is ignored for [`Operation::Unlock`], which never waits.
pub(crate) fn dispatch(
    native: &NativeRwLock,
    scheduler: &dyn HostScheduler,
    operation: Operation,
    blocking: bool,
) -> Result<bool, RWLockError> {
    let code = match (operation, blocking) {
        (Operation::Read, true) => wait_on(scheduler, || native.read()),
        (Operation::Read, false) => native.try_read(),
        (Operation::Write, true) => wait_on(scheduler, || native.write()),
        (Operation::Write, false) => native.try_write(),
        (Operation::Unlock, _) => native.unlock(),
    };

    match code {
        0 => Ok(true),
        libc::EBUSY if operation.is_acquire() && !blocking => Ok(false),
        err => Err(RWLockError::lock(operation, err)),
    }
}

/// Runs a blocking native call with host scheduling control yielded for its duration.
///
/// The call runs at most once however often the scheduler invokes `wait`. A scheduler that
/// never invokes it leaves the lock untouched, which is reported as `EINVAL`.
fn wait_on(scheduler: &dyn HostScheduler, mut call: impl FnMut() -> libc::c_int) -> libc::c_int {
    let mut code = None;
    scheduler.run_blocking(&mut || {
        if code.is_none() {
            code = Some(call());
        }
    });

    code.unwrap_or_else(|| {
        log::error!(target: "posix_rwlock", "Host scheduler returned without running the native wait");
        libc::EINVAL
    })
}
