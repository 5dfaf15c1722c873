// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use bm_engine::RunError;
use std::fmt;

/// Process exit codes.
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const RESOLUTION: i32 = 3;
    pub const CAPTURE: i32 = 4;
    pub const TRANSFER: i32 = 5;
    pub const MATERIALIZE: i32 = 6;
    pub const CONCURRENCY: i32 = 7;
    pub const CANCELLED: i32 = 8;
}

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Exit code for a failed run.
pub fn exit_code(error: &RunError) -> i32 {
    match error {
        RunError::Resolution(_) => code::RESOLUTION,
        RunError::Capture { .. } => code::CAPTURE,
        RunError::Transfer { .. } => code::TRANSFER,
        RunError::Prepare(_) | RunError::Materialize(_) | RunError::Server { .. } => code::MATERIALIZE,
        RunError::Concurrency(_) => code::CONCURRENCY,
        RunError::Cancelled => code::CANCELLED,
        RunError::Catalog(_) | RunError::Archive(_) | RunError::Io(_) => code::INTERNAL,
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
