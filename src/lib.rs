// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Namesake provides safe Rust bindings for POSIX named semaphores.
//!
//! This documentation covers the usage and design of Namesake.
//!
//! # Getting started
//!
//! One process creates a semaphore with [`NamedSemaphore::create`]. Other
//! processes, or other parts of the same process, attach to it with
//! [`NamedSemaphore::open`]. Everybody uses the same _logical_ name; you
//! never supply the leading `/` that POSIX requires.
//!
//! ```no_run
//! use namesake::NamedSemaphore;
//!
//! # (|| -> Result<(), namesake::Error> {
//! // In the process that owns the resource...
//! let mut sema = NamedSemaphore::create("printer", 1, false)?;
//!
//! sema.wait()?;
//! // Exclusive access to the printer.
//! sema.post()?;
//!
//! // In any other process...
//! let mut sema = NamedSemaphore::open("printer")?;
//! if sema.try_wait()? {
//!     // We got it without blocking.
//!     sema.post()?;
//! }
//! # Ok(()) })().unwrap();
//! ```
//!
//! # Design
//!
//! ## Ownership
//!
//! The instance that creates a semaphore is its _owner_. When the owner is
//! dropped, it closes its handle and unlinks the name from the system. After
//! that, nobody can [`open`](NamedSemaphore::open) the name, though handles
//! that are already open keep working until they're dropped.
//!
//! An instance that merely opened the semaphore only closes its handle when
//! it's dropped. Ownership is decided at construction and never changes.
//!
//! If several instances create the same name with `force`, each of them
//! is an owner, and there is no coordination between them. The *first*
//! owner to drop unlinks the name, so new opens fail from then on even
//! though the other owners still hold working handles. When those owners
//! drop, their unlink fails with `ENOENT`, which is logged and otherwise
//! ignored.
//!
//! ## Acquisition state
//!
//! Each instance remembers whether it currently holds the semaphore. It can
//! hold at most one count. Waiting while holding, or posting while not
//! holding, is a [`LogicError`]. The check is local to the instance; the
//! kernel object's count is shared by everybody who opened the name.
//!
//! Dropping an instance that holds the semaphore does *not* post it.
//!
//! ## Method naming conventions
//!
//! Acquiring the semaphore may block indefinitely, never block, or block
//! for some time. When the method name is
//!
//! - [`wait`](NamedSemaphore::wait), then the call **blocks indefinitely**.
//! - prefixed with `try_*`, then the call is **non-blocking**.
//! - suffixed with `*_timeout`, then the call **blocks for the given [`Timeout`]**.
//!
//! ## Timeouts are OK
//!
//! A timeout is not an error; it's exactly what you asked for. The same
//! goes for a `try_*` call that finds the semaphore unavailable. Both
//! signal the outcome through `Ok(false)`. `Ok(true)` means that the
//! semaphore was acquired.
//!
//! ## Errors
//!
//! [`Error`] separates "your code is wrong" from "the OS refused." See the
//! [`Error`] documentation for the variants.
//!
//! ## Threads
//!
//! A [`NamedSemaphore`] has no internal lock. Every method that changes
//! its state takes `&mut self`, so the borrow checker serializes them.
//! You can move an instance to another thread, or give each thread its
//! own instance of the same name.
//!
//! # Platform support
//!
//! Namesake needs `sem_open` and `sem_timedwait`. Linux, Android, and the
//! BSDs provide both. Apple platforms lack `sem_timedwait`, so they're
//! rejected at build time.

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    let_underscore_drop,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_numeric_casts,
    unsafe_op_in_unsafe_fn,
    unreachable_pub,
    unused_qualifications,
    clippy::cast_possible_truncation,
    clippy::map_unwrap_or,
    clippy::manual_assert,
    clippy::missing_safety_doc,
    clippy::ref_as_ptr,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::undocumented_unsafe_blocks,
    clippy::used_underscore_binding
)]
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

#[cfg(not(unix))]
compile_error!("Namesake requires POSIX named semaphores");

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
compile_error!("Namesake requires sem_timedwait, which Apple platforms do not provide");

/// Defines an error enumeration with a fixed message per variant.
///
/// The enum implements `Display` with the message, and `std::error::Error`.
macro_rules! error_enum {
    (
        $(#[$enum_meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $message:literal
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl $name {
            /// A short, human-readable description.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(
                    Self::$variant => $message,
                    )*
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::error::Error for $name {}
    };
}

mod error;
mod time;

pub mod semaphore;

use std::ffi::CString;

pub use error::{Error, InvalidArgument, LogicError, OsError, Operation};
pub use semaphore::{unlink, CreateOptions, NamedSemaphore};

/// How long to wait for the semaphore.
///
/// The timeout is relative to the moment you call
/// [`wait_timeout`](NamedSemaphore::wait_timeout). It's expressed as whole
/// seconds plus nanoseconds, like a `timespec`.
///
/// A timeout is valid when
///
/// - neither field is negative,
/// - `nanos` is less than [`NANOS_LIMIT`](Self::NANOS_LIMIT), and
/// - it isn't zero. Use [`try_wait`](NamedSemaphore::try_wait) instead.
///
/// Invalid timeouts can be constructed; they're rejected with
/// [`InvalidArgument::InvalidTimeout`] when you wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeout {
    /// Whole seconds.
    pub secs: i64,
    /// Additional nanoseconds.
    pub nanos: i64,
}

impl Timeout {
    /// The exclusive upper bound for [`nanos`](Self::nanos).
    ///
    /// This is one millisecond, which is tighter than the one second
    /// bound of a `timespec`.
    pub const NANOS_LIMIT: i64 = 1_000_000;

    /// Construct a timeout from seconds and nanoseconds.
    ///
    /// The values aren't checked until you wait. Use [`is_valid`](Self::is_valid)
    /// to check ahead of time.
    pub const fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    /// Construct a timeout of whole seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self::new(secs, 0)
    }

    /// Returns `true` if [`wait_timeout`](NamedSemaphore::wait_timeout) will
    /// accept this timeout.
    pub const fn is_valid(self) -> bool {
        self.secs >= 0
            && self.nanos >= 0
            && self.nanos < Self::NANOS_LIMIT
            && !(self.secs == 0 && self.nanos == 0)
    }
}

/// Map a logical name to the name POSIX expects.
///
/// The logical name must be non-empty and free of NUL bytes.
fn posix_name(name: &str) -> Result<CString, InvalidArgument> {
    if name.is_empty() {
        return Err(InvalidArgument::EmptyName);
    }

    let mut raw = Vec::with_capacity(name.len() + 1);
    raw.push(b'/');
    raw.extend_from_slice(name.as_bytes());
    CString::new(raw).map_err(|_| InvalidArgument::NulInName)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_name_adds_one_slash() {
        assert_eq!(posix_name("abc").unwrap().as_bytes(), b"/abc");
        assert_eq!(posix_name("/abc").unwrap().as_bytes(), b"//abc");
        assert_eq!(posix_name(""), Err(InvalidArgument::EmptyName));
        assert_eq!(posix_name("a\0b"), Err(InvalidArgument::NulInName));
    }

    #[test]
    fn timeout_bounds() {
        assert!(Timeout::from_secs(1).is_valid());
        assert!(Timeout::new(0, 1).is_valid());
        assert!(Timeout::new(0, Timeout::NANOS_LIMIT - 1).is_valid());

        assert!(!Timeout::new(0, 0).is_valid());
        assert!(!Timeout::new(-1, 0).is_valid());
        assert!(!Timeout::new(1, -1).is_valid());
        assert!(!Timeout::new(1, Timeout::NANOS_LIMIT).is_valid());
        assert!(!Timeout::new(0, 999_999_999).is_valid());
    }
}
