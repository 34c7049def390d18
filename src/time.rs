// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Absolute deadlines for `sem_timedwait`.
//!
//! `sem_timedwait` takes an absolute time measured against `CLOCK_REALTIME`.
//! A deadline computed from `CLOCK_MONOTONIC` would be off by the system's
//! uptime-to-epoch difference, so we always read the realtime clock.

use crate::{
    error::{OsError, Operation},
    Timeout,
};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point on the realtime clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WallTime {
    pub(crate) secs: i64,
    /// Always in `0..NANOS_PER_SEC`.
    pub(crate) nanos: i64,
}

impl WallTime {
    /// Read `CLOCK_REALTIME`.
    pub(crate) fn now() -> Result<Self, OsError> {
        // Safety: An all-zero timespec is valid; it's a plain C struct
        // of integers (and, on some targets, integer padding).
        let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
        // Safety: `ts` is a valid, writable timespec.
        let result = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        if result == -1 {
            return Err(OsError::last(Operation::Clock));
        }

        #[allow(trivial_numeric_casts)]
        let nanos = ts.tv_nsec as i64;
        Ok(Self {
            secs: i64::from(ts.tv_sec),
            nanos,
        })
    }

    /// The time `timeout` after `self`.
    ///
    /// Nanoseconds that overflow one second carry into the seconds field.
    /// The seconds saturate instead of wrapping.
    ///
    /// `timeout` must be valid; see [`Timeout::is_valid`].
    pub(crate) const fn after(self, timeout: Timeout) -> Self {
        let nanos = self.nanos + timeout.nanos;
        let secs = self
            .secs
            .saturating_add(timeout.secs)
            .saturating_add(nanos / NANOS_PER_SEC);
        Self {
            secs,
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Convert into the `timespec` expected by `sem_timedwait`.
    #[allow(clippy::cast_possible_truncation, trivial_numeric_casts)]
    pub(crate) fn to_timespec(self) -> libc::timespec {
        // Safety: see `now`.
        let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
        ts.tv_sec = self.secs.min(libc::time_t::MAX as i64) as libc::time_t;
        ts.tv_nsec = self.nanos as _;
        ts
    }
}
