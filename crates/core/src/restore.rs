// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore request types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::BackupId;

/// Which point in time to restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "id", rename_all = "snake_case")]
pub enum RestoreRequest {
    ById(BackupId),
    LatestFull,
    LatestIncremental,
}

impl fmt::Display for RestoreRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreRequest::ById(id) => write!(f, "id {}", id),
            RestoreRequest::LatestFull => f.write_str("latest full"),
            RestoreRequest::LatestIncremental => f.write_str("latest incremental"),
        }
    }
}

/// How prepared files are placed into the data directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeMethod {
    /// Duplicate files; the prepared copy stays in staging.
    #[default]
    Copy,
    /// Relocate files; the prepared copy is consumed.
    Move,
}

impl MaterializeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MaterializeMethod::Copy => "copy",
            MaterializeMethod::Move => "move",
        }
    }
}

impl fmt::Display for MaterializeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
