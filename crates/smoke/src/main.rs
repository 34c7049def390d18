// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Run the smoke test from the command line.
//!
//! Usage: `namesake-smoke [NAME]`. The exit code identifies the failing
//! step; see [`namesake_smoke::Failure::exit_code`].

use std::process::ExitCode;

const DEFAULT_NAME: &str = "namesake_smoke_semaphore";

fn main() -> ExitCode {
    env_logger::init();

    let name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_NAME.to_owned());

    match namesake_smoke::run(&name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            log::error!("smoke test failed: {failure}");
            ExitCode::from(failure.exit_code())
        }
    }
}
