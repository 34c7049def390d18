// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Errors produced by named semaphores.
//!
//! Every fallible call returns an [`Error`]. The variant tells you who is at
//! fault:
//!
//! - [`Error::InvalidArgument`] means the caller passed a value that breaks a
//!   documented precondition.
//! - [`Error::Logic`] means the caller used the acquire / release protocol in
//!   the wrong order.
//! - [`Error::Os`] means the operating system refused the request.
//!
//! The first two are bugs in the calling code. Only the last one depends on
//! the environment.

use core::fmt;
use std::io;

error_enum! {
    /// A value violated a documented precondition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum InvalidArgument {
        /// A semaphore was created with an initial count of zero.
        ZeroInitialCount => "semaphore cannot be initialized with value 0",

        /// The timeout was negative, zero, or its nanoseconds exceeded
        /// [`Timeout::NANOS_LIMIT`](crate::Timeout::NANOS_LIMIT).
        InvalidTimeout => "invalid timeout value",

        /// The semaphore name was empty.
        EmptyName => "semaphore name is empty",

        /// The semaphore name contained a NUL byte.
        NulInName => "semaphore name contains a NUL byte",
    }
}

error_enum! {
    /// The acquire / release protocol was used out of order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum LogicError {
        /// This instance already holds the semaphore.
        ///
        /// Post before you wait again.
        AlreadyAcquired => "semaphore already acquired",

        /// This instance does not hold the semaphore.
        NotAcquired => "semaphore not acquired",
    }
}

error_enum! {
    /// The operating system call that failed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Operation {
        /// `sem_open` with `O_CREAT`.
        Create => "sem_open (create)",
        /// `sem_open` without `O_CREAT`.
        Open => "sem_open",
        /// `sem_wait`.
        Wait => "sem_wait",
        /// `sem_timedwait`.
        TimedWait => "sem_timedwait",
        /// `sem_trywait`.
        TryWait => "sem_trywait",
        /// `sem_post`.
        Post => "sem_post",
        /// `clock_gettime`, while computing a deadline.
        Clock => "clock_gettime",
        /// `sem_getvalue`.
        GetValue => "sem_getvalue",
        /// `sem_unlink`.
        Unlink => "sem_unlink",
    }
}

/// An operating system call failed.
///
/// Carries the failed [`Operation`] and the `errno` it reported. Convert it
/// into an [`io::Error`] for the platform's description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OsError {
    operation: Operation,
    errno: i32,
}

impl OsError {
    pub(crate) const fn new(operation: Operation, errno: i32) -> Self {
        Self { operation, errno }
    }

    /// Capture `errno` for a call that just failed.
    ///
    /// Call this immediately after the failing call, before anything else
    /// can overwrite `errno`.
    pub(crate) fn last(operation: Operation) -> Self {
        let errno = io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::EIO);
        Self::new(operation, errno)
    }

    /// The call that failed.
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// The raw `errno` value.
    pub const fn raw_os_error(&self) -> i32 {
        self.errno
    }

    /// The portable classification of this error.
    pub fn kind(&self) -> io::ErrorKind {
        io::Error::from_raw_os_error(self.errno).kind()
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {}",
            self.operation,
            io::Error::from_raw_os_error(self.errno)
        )
    }
}

impl std::error::Error for OsError {}

impl From<OsError> for io::Error {
    fn from(err: OsError) -> Self {
        io::Error::from_raw_os_error(err.errno)
    }
}

/// Any error from a named semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The caller supplied a bad value.
    InvalidArgument(InvalidArgument),
    /// The caller invoked an operation in the wrong state.
    Logic(LogicError),
    /// The operating system call failed.
    Os(OsError),
}

impl Error {
    /// Returns the `errno` if this is an [`Error::Os`].
    pub const fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Os(err) => Some(err.raw_os_error()),
            Self::InvalidArgument(_) | Self::Logic(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(err) => write!(f, "invalid argument: {err}"),
            Self::Logic(err) => write!(f, "logic error: {err}"),
            Self::Os(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(err) => Some(err),
            Self::Logic(err) => Some(err),
            Self::Os(err) => Some(err),
        }
    }
}

impl From<InvalidArgument> for Error {
    fn from(err: InvalidArgument) -> Self {
        Self::InvalidArgument(err)
    }
}

impl From<LogicError> for Error {
    fn from(err: LogicError) -> Self {
        Self::Logic(err)
    }
}

impl From<OsError> for Error {
    fn from(err: OsError) -> Self {
        Self::Os(err)
    }
}
