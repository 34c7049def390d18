// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! A smoke test for named semaphores.
//!
//! [`run`] walks one semaphore through every API path: creation, a
//! rejected duplicate, blocking / non-blocking acquisition, protocol
//! misuse, a second opener, and teardown. The first unexpected outcome
//! is reported as a [`Failure`].

use core::fmt;
use std::io;

use namesake::{Error, LogicError, NamedSemaphore};

/// The step of the smoke test that went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A second, unforced create of the same name succeeded.
    DuplicateCreated,
    /// A second wait without a post succeeded.
    DoubleWait,
    /// A second post without a wait succeeded.
    DoublePost,
    /// An operation that should succeed failed.
    Unexpected(Error),
    /// The name could still be opened after the owner was dropped.
    NameSurvived,
    /// A non-blocking wait found an idle semaphore unavailable.
    Unavailable,
}

impl Failure {
    /// The process exit code for this failure.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::DuplicateCreated => 1,
            Self::DoubleWait => 2,
            Self::DoublePost => 3,
            Self::Unexpected(_) => 4,
            Self::NameSurvived => 5,
            Self::Unavailable => 6,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateCreated => f.write_str("unforced duplicate create succeeded"),
            Self::DoubleWait => f.write_str("second wait succeeded"),
            Self::DoublePost => f.write_str("second post succeeded"),
            Self::Unexpected(err) => write!(f, "unexpected error: {err}"),
            Self::NameSurvived => f.write_str("name still resolvable after teardown"),
            Self::Unavailable => f.write_str("try_wait found the semaphore unavailable"),
        }
    }
}

impl std::error::Error for Failure {}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::Unexpected(err)
    }
}

/// Run the smoke test against `name`.
///
/// `name` must not be in use by anybody else. It's created with `force`,
/// so a stale name left behind by an earlier, crashed run is taken over.
pub fn run(name: &str) -> Result<(), Failure> {
    {
        let mut sem = NamedSemaphore::create(name, 1, true)?;
        log::info!("created '{name}'");

        if NamedSemaphore::create(name, 1, false).is_ok() {
            return Err(Failure::DuplicateCreated);
        }

        sem.wait()?;
        sem.post()?;

        if !sem.try_wait()? {
            return Err(Failure::Unavailable);
        }
        sem.post()?;

        sem.wait()?;
        match sem.wait() {
            Err(Error::Logic(LogicError::AlreadyAcquired)) => {}
            Err(err) => return Err(err.into()),
            Ok(()) => return Err(Failure::DoubleWait),
        }
        sem.post()?;

        match sem.post() {
            Err(Error::Logic(LogicError::NotAcquired)) => {}
            Err(err) => return Err(err.into()),
            Ok(()) => return Err(Failure::DoublePost),
        }

        let opened = NamedSemaphore::open(name)?;
        log::info!("opened '{}' a second time", opened.name());
    }

    ensure_unlinked(name)
}

/// The name must be gone. Any other reason `open` fails is unexpected.
fn ensure_unlinked(name: &str) -> Result<(), Failure> {
    match NamedSemaphore::open(name) {
        Ok(_) => Err(Failure::NameSurvived),
        Err(Error::Os(err)) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlinked_means_not_found() {
        let name = format!("namesake-smoke-unit-{}", std::process::id());
        assert_eq!(ensure_unlinked(&name), Ok(()));

        let sema = NamedSemaphore::create(&name, 1, false).unwrap();
        assert_eq!(ensure_unlinked(&name), Err(Failure::NameSurvived));
        drop(sema);
        assert_eq!(ensure_unlinked(&name), Ok(()));
    }

    #[test]
    fn other_open_failures_are_unexpected() {
        // Longer than NAME_MAX. The OS rejects it without looking it up.
        let name = "x".repeat(300);
        let failure = ensure_unlinked(&name).unwrap_err();
        match failure {
            Failure::Unexpected(Error::Os(err)) => {
                assert_ne!(err.kind(), io::ErrorKind::NotFound, "{err}");
            }
            other => panic!("{other}"),
        }
    }
}
