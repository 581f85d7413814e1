//! Error type for the reader/writer lock.
//!
//! Every failure carries the description the operating system gives for the underlying
//! error code, so operators see e.g. "Resource deadlock avoided (os error 35)" rather than
//! an opaque wrapper message. A non-blocking acquisition that finds the lock busy is not an
//! error and never produces one of these.

use crate::operation::Operation;
use std::fmt::{Display, Formatter};
use std::io;

/// The error type for all [`RwLock`](crate::RwLock) operations
#[derive(Debug)]
pub enum RWLockError {
    /// The native primitive could not be initialized. The lock was never constructed
    Initialization(io::Error),
    /// The native primitive rejected an operation with an error other than "would block"
    Lock {
        operation: Operation,
        source: io::Error,
    },
    /// The native primitive could not be destroyed. Its storage has been leaked, not freed
    Destruction(io::Error),
    /// A compact operation code did not name any known operation
    UnknownOperation(char),
}

impl RWLockError {
    pub(crate) fn lock(operation: Operation, code: libc::c_int) -> Self {
        Self::Lock {
            operation,
            source: io::Error::from_raw_os_error(code),
        }
    }

    /// Returns the raw OS error code, if this error came from the OS
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Initialization(err) | Self::Destruction(err) => err.raw_os_error(),
            Self::Lock { source, .. } => source.raw_os_error(),
            Self::UnknownOperation(_) => None,
        }
    }

    /// The human-readable description of the underlying condition, as given by the OS
    pub fn os_description(&self) -> String {
        match self {
            Self::Initialization(err) | Self::Destruction(err) => err.to_string(),
            Self::Lock { source, .. } => source.to_string(),
            Self::UnknownOperation(code) => format!("Unknown operation {code:?}"),
        }
    }

    /// Consumes self and returns the full error message
    pub fn into_string(self) -> String {
        self.to_string()
    }
}

impl Display for RWLockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization(err) => write!(f, "RWLock initialization failed: {err}"),
            Self::Lock { operation, source } => write!(f, "RWLock {operation} failed: {source}"),
            Self::Destruction(err) => write!(f, "RWLock destruction failed: {err}"),
            Self::UnknownOperation(code) => write!(f, "Unknown operation {code:?}"),
        }
    }
}

impl std::error::Error for RWLockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Initialization(err) | Self::Destruction(err) => Some(err),
            Self::Lock { source, .. } => Some(source),
            Self::UnknownOperation(_) => None,
        }
    }
}

impl From<RWLockError> for io::Error {
    fn from(err: RWLockError) -> Self {
        match err.raw_os_error() {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::new(io::ErrorKind::InvalidInput, err.into_string()),
        }
    }
}
