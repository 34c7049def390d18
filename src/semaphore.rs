// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Named semaphore services.
//!
//! A [`NamedSemaphore`] wraps a POSIX named semaphore. The kernel object
//! tracks an unsigned counter shared by every process that opens the name.
//! Every post increments the counter, and every wait decrements it. If the
//! counter is zero, waiters may block until somebody posts.
//!
//! # Example
//!
//! A creator with a non-zero initial count, and an opener of the same name.
//!
//! ```no_run
//! use namesake::{NamedSemaphore, Timeout};
//!
//! # (|| -> Result<(), namesake::Error> {
//! let mut owner = NamedSemaphore::create("jobs", 2, false)?;
//! let mut other = NamedSemaphore::open("jobs")?;
//!
//! owner.wait()?;
//! assert!(other.wait_timeout(Timeout::from_secs(1))?);
//!
//! other.post()?;
//! owner.post()?;
//! # Ok(()) })().unwrap();
//! // <-- "jobs" is unlinked when `owner` drops.
//! ```
//!
//! Custom permissions, and taking over a stale name left behind by a
//! crashed owner.
//!
//! ```no_run
//! use namesake::{CreateOptions, NamedSemaphore};
//!
//! # (|| -> Result<(), namesake::Error> {
//! let mut opts = CreateOptions::default();
//! opts.initial_count = 4;
//! opts.force = true;
//! opts.mode = 0o600;
//!
//! let sema = NamedSemaphore::create_with_options("workers", &opts)?;
//! assert!(sema.is_owner());
//! # Ok(()) })().unwrap();
//! ```

use core::{fmt, ptr::NonNull};
use std::{
    ffi::{CStr, CString},
    io,
};

use crate::{
    error::{Error, InvalidArgument, LogicError, OsError, Operation},
    time::WallTime,
    Timeout,
};

/// Configure how a semaphore is created.
///
/// Supply these values to [`create_with_options`](NamedSemaphore::create_with_options).
/// More options may be added, so start from the defaults.
///
/// ```
/// use namesake::CreateOptions;
///
/// let mut opts = CreateOptions::default();
/// opts.mode = 0o600;
/// ```
/// ```compile_fail,E0639
/// // Error: struct literal of a non-exhaustive type.
/// # use namesake::CreateOptions;
/// let opts = CreateOptions {
///     initial_count: 1,
///     force: false,
///     mode: 0o600,
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct CreateOptions {
    /// The semaphore's initial count.
    ///
    /// Must be non-zero. By default, this is one.
    pub initial_count: u32,
    /// Reuse an existing semaphore with the same name.
    ///
    /// When `false`, creation fails if the name already exists. By default,
    /// this is `false`.
    pub force: bool,
    /// Permission bits for a newly-created semaphore.
    ///
    /// The process umask still applies. By default, this is `0o640`.
    pub mode: u32,
}

impl CreateOptions {
    /// The default permission bits.
    pub const DEFAULT_MODE: u32 = 0o640;
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            initial_count: 1,
            force: false,
            mode: Self::DEFAULT_MODE,
        }
    }
}

/// A counting semaphore shared between processes by name.
///
/// To decrement the counter, use
///
/// - [`wait`](Self::wait) if you're willing to wait forever.
/// - [`try_wait`](Self::try_wait) for a non-blocking decrement.
/// - [`wait_timeout`](Self::wait_timeout) to wait for some time.
///
/// To increment the counter, use [`post`](Self::post).
///
/// An instance can hold at most one count at a time. See
/// [the crate-level documentation](crate#acquisition-state) for the
/// rules, and [the module-level documentation](crate::semaphore) for
/// examples.
///
/// Each instance owns its handle, so there is no `Clone`.
///
/// ```compile_fail,E0599
/// # use namesake::NamedSemaphore;
/// # fn f(sema: NamedSemaphore) {
/// let copy = sema.clone();
/// # }
/// ```
///
/// Waiting changes the acquisition state, so it needs `&mut self`.
///
/// ```compile_fail,E0596
/// # use namesake::NamedSemaphore;
/// # fn f(sema: NamedSemaphore) {
/// let shared = &sema;
/// shared.wait();
/// # }
/// ```
///
/// Ownership is fixed at construction. An opener can't take over the
/// unlink.
///
/// ```compile_fail,E0616
/// # use namesake::NamedSemaphore;
/// # fn f(mut sema: NamedSemaphore) {
/// sema.owner = true;
/// # }
/// ```
pub struct NamedSemaphore {
    name: String,
    /// `name` with the leading slash. Kept so that drop can unlink
    /// without allocating.
    os_name: CString,
    handle: NonNull<libc::sem_t>,
    owner: bool,
    acquired: bool,
}

// Safety: POSIX semaphore handles are usable from any thread of the process
// that opened them. The instance exclusively owns its handle.
unsafe impl Send for NamedSemaphore {}

// Safety: The only methods reachable through a shared reference are the
// accessors and `value`. `sem_getvalue` is thread safe. Everything that
// changes the count or the acquisition state takes `&mut self`.
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Create a new named semaphore.
    ///
    /// `initial_count` must be non-zero. If `force` is `false`, then this
    /// fails when a semaphore with the same name already exists. If
    /// `force` is `true`, then an existing semaphore is reused.
    ///
    /// The new instance is the owner. It unlinks `name` when it's dropped.
    pub fn create(name: &str, initial_count: u32, force: bool) -> Result<Self, Error> {
        Self::create_with_options(
            name,
            &CreateOptions {
                initial_count,
                force,
                ..Default::default()
            },
        )
    }

    /// Create a new named semaphore with options.
    ///
    /// See [`create`](Self::create) for the semantics.
    pub fn create_with_options(name: &str, opts: &CreateOptions) -> Result<Self, Error> {
        if opts.initial_count == 0 {
            return Err(InvalidArgument::ZeroInitialCount.into());
        }
        let os_name = crate::posix_name(name)?;

        let mut oflag = libc::O_CREAT;
        if !opts.force {
            oflag |= libc::O_EXCL;
        }

        // Safety: `os_name` is NUL terminated and outlives the call. With
        // O_CREAT, sem_open reads a mode and an unsigned value from the
        // variadic arguments. Both are u32, which is the promoted c_uint.
        let raw =
            unsafe { libc::sem_open(os_name.as_ptr(), oflag, opts.mode, opts.initial_count) };
        let handle = checked_handle(raw, Operation::Create)?;

        log::debug!(
            "created semaphore '{name}' (count {}, force {})",
            opts.initial_count,
            opts.force
        );
        Ok(Self {
            name: name.to_owned(),
            os_name,
            handle,
            owner: true,
            acquired: false,
        })
    }

    /// Open an existing named semaphore.
    ///
    /// This fails if there's no semaphore with that name. The new
    /// instance is not the owner; dropping it leaves the name in place.
    pub fn open(name: &str) -> Result<Self, Error> {
        let os_name = crate::posix_name(name)?;

        // Safety: `os_name` is NUL terminated and outlives the call.
        // Without O_CREAT, sem_open takes no variadic arguments.
        let raw = unsafe { libc::sem_open(os_name.as_ptr(), 0) };
        let handle = checked_handle(raw, Operation::Open)?;

        log::debug!("opened semaphore '{name}'");
        Ok(Self {
            name: name.to_owned(),
            os_name,
            handle,
            owner: false,
            acquired: false,
        })
    }
}

impl NamedSemaphore {
    /// Decrement the count, waiting until it's non-zero.
    ///
    /// Blocks while the count is zero. An interrupted wait is reported
    /// as an [`Error::Os`] with `EINTR`; it's not retried.
    pub fn wait(&mut self) -> Result<(), Error> {
        self.ensure_idle()?;

        // Safety: The handle is valid from construction until drop.
        let result = unsafe { libc::sem_wait(self.handle.as_ptr()) };
        if result == -1 {
            return Err(OsError::last(Operation::Wait).into());
        }

        self.acquired = true;
        Ok(())
    }

    /// Try to decrement the count until the timeout expires.
    ///
    /// Blocks while the count is zero. If the timeout expires, the result is
    /// `Ok(false)` and nothing changes. If the count becomes non-zero, the
    /// count is decremented and the result is `Ok(true)`.
    ///
    /// The deadline is computed from the realtime clock when you call. If
    /// somebody changes the system time while you wait, the wait is
    /// shortened or stretched accordingly.
    pub fn wait_timeout(&mut self, timeout: Timeout) -> Result<bool, Error> {
        self.ensure_idle()?;
        if !timeout.is_valid() {
            return Err(InvalidArgument::InvalidTimeout.into());
        }

        let deadline = WallTime::now()?.after(timeout).to_timespec();

        // Safety: The handle is valid from construction until drop. The
        // deadline is a valid timespec that outlives the call.
        let result = unsafe { libc::sem_timedwait(self.handle.as_ptr(), &deadline) };
        if result == -1 {
            let err = OsError::last(Operation::TimedWait);
            if err.raw_os_error() == libc::ETIMEDOUT {
                return Ok(false);
            }
            return Err(err.into());
        }

        self.acquired = true;
        Ok(true)
    }

    /// Try to decrement the count.
    ///
    /// If the count is zero, this call returns immediately with `Ok(false)`.
    /// Otherwise, it decrements the count by one and returns `Ok(true)`.
    pub fn try_wait(&mut self) -> Result<bool, Error> {
        self.ensure_idle()?;

        // Safety: The handle is valid from construction until drop.
        let result = unsafe { libc::sem_trywait(self.handle.as_ptr()) };
        if result == -1 {
            let err = OsError::last(Operation::TryWait);
            if err.raw_os_error() == libc::EAGAIN {
                return Ok(false);
            }
            return Err(err.into());
        }

        self.acquired = true;
        Ok(true)
    }

    /// Increment the count by one.
    ///
    /// This instance must hold the semaphore. This can unblock another
    /// waiter, in this process or another.
    pub fn post(&mut self) -> Result<(), Error> {
        if !self.acquired {
            return Err(LogicError::NotAcquired.into());
        }

        // Safety: The handle is valid from construction until drop.
        let result = unsafe { libc::sem_post(self.handle.as_ptr()) };
        if result == -1 {
            return Err(OsError::last(Operation::Post).into());
        }

        self.acquired = false;
        Ok(())
    }

    /// Returns the semaphore's current count.
    ///
    /// The count is shared with every other opener, so it may have
    /// changed by the time you look at it.
    pub fn value(&self) -> Result<u32, Error> {
        let mut value: libc::c_int = 0;
        // Safety: The handle is valid from construction until drop. `value`
        // is a valid, writable c_int.
        let result = unsafe { libc::sem_getvalue(self.handle.as_ptr(), &mut value) };
        if result == -1 {
            return Err(OsError::last(Operation::GetValue).into());
        }

        // Some implementations report waiters as a negative count.
        Ok(u32::try_from(value).unwrap_or(0))
    }

    /// Returns `true` if this instance holds the semaphore.
    #[inline]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Returns `true` if this instance created the semaphore.
    ///
    /// The owner unlinks the name when it's dropped.
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// The logical name, without the leading slash.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_idle(&self) -> Result<(), LogicError> {
        if self.acquired {
            Err(LogicError::AlreadyAcquired)
        } else {
            Ok(())
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Safety: The handle is valid from construction until now, and
        // it's never used again.
        let result = unsafe { libc::sem_close(self.handle.as_ptr()) };
        if result == -1 {
            log::warn!(
                "sem_close failed for semaphore '{}': {}",
                self.name,
                io::Error::last_os_error()
            );
        }

        if self.owner {
            match unlink_posix_name(&self.os_name) {
                Ok(()) => log::debug!("unlinked semaphore '{}'", self.name),
                Err(err) => log::warn!(
                    "sem_unlink failed for semaphore '{}': {}",
                    self.name,
                    io::Error::from(err)
                ),
            }
        }
    }
}

impl fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("acquired", &self.acquired)
            .finish_non_exhaustive()
    }
}

/// Remove a semaphore name from the system.
///
/// Use this to clear a name left behind by an owner that never dropped,
/// for instance after a crash. Open handles keep working; new calls to
/// [`open`](NamedSemaphore::open) fail.
///
/// This is independent of ownership. If an owner later drops, its own
/// unlink fails and is logged.
pub fn unlink(name: &str) -> Result<(), Error> {
    let os_name = crate::posix_name(name)?;
    unlink_posix_name(&os_name)?;
    log::debug!("unlinked semaphore '{name}'");
    Ok(())
}

fn unlink_posix_name(os_name: &CStr) -> Result<(), OsError> {
    // Safety: `os_name` is NUL terminated and outlives the call.
    let result = unsafe { libc::sem_unlink(os_name.as_ptr()) };
    if result == -1 {
        Err(OsError::last(Operation::Unlink))
    } else {
        Ok(())
    }
}

fn checked_handle(
    raw: *mut libc::sem_t,
    operation: Operation,
) -> Result<NonNull<libc::sem_t>, OsError> {
    if raw == libc::SEM_FAILED {
        return Err(OsError::last(operation));
    }
    // sem_open never returns null on success. Don't consult errno here,
    // since the call didn't fail.
    NonNull::new(raw).ok_or(OsError::new(operation, libc::EINVAL))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("namesake-unit-{}-{tag}", std::process::id())
    }

    #[test]
    fn default_options() {
        let opts = CreateOptions::default();
        assert_eq!(opts.initial_count, 1);
        assert!(!opts.force);
        assert_eq!(opts.mode, 0o640);
    }

    #[test]
    fn zero_count_checked_before_name() {
        let err = NamedSemaphore::create("", 0, false).unwrap_err();
        assert_eq!(err, Error::InvalidArgument(InvalidArgument::ZeroInitialCount));
    }

    #[test]
    fn debug_shows_state() {
        let mut sema = NamedSemaphore::create(&unique("debug"), 1, false).unwrap();
        sema.wait().unwrap();
        let debug = format!("{sema:?}");
        assert!(debug.contains("owner: true"), "{debug}");
        assert!(debug.contains("acquired: true"), "{debug}");
        sema.post().unwrap();
    }

    #[test]
    fn value_tracks_count() {
        let mut sema = NamedSemaphore::create(&unique("value"), 3, false).unwrap();
        assert_eq!(sema.value().unwrap(), 3);
        assert!(sema.try_wait().unwrap());
        assert_eq!(sema.value().unwrap(), 2);
        sema.post().unwrap();
        assert_eq!(sema.value().unwrap(), 3);
    }

    #[test]
    fn null_handle_does_not_read_errno() {
        // Leave a misleading errno behind.
        let missing = CString::new("/namesake-unit-missing").unwrap();
        // Safety: The name is a valid C string.
        unsafe { libc::sem_unlink(missing.as_ptr()) };

        let err = checked_handle(core::ptr::null_mut(), Operation::Open).unwrap_err();
        assert_eq!(err, OsError::new(Operation::Open, libc::EINVAL));
    }

    #[test]
    fn failed_create_leaves_nothing_behind() {
        let name = unique("failed");
        assert!(NamedSemaphore::create(&name, 0, true).is_err());
        let err = NamedSemaphore::open(&name).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
