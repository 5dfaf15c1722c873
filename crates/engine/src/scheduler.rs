// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-versus-incremental decision.

use bm_core::{BackupId, BackupKind, BackupStatus, Cadence};
use bm_storage::CatalogState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Why the scheduler chose a full backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FullReason {
    Forced,
    NoFullBackup,
    LatestFullFailed,
    Due,
}

impl fmt::Display for FullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FullReason::Forced => "forced",
            FullReason::NoFullBackup => "no succeeded full backup",
            FullReason::LatestFullFailed => "latest full backup failed",
            FullReason::Due => "full backup due",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupPlan {
    Full { reason: FullReason },
    /// Parent is always the latest succeeded full.
    Incremental { parent: BackupId, next_full_due: DateTime<Utc> },
}

impl BackupPlan {
    pub fn kind(&self) -> BackupKind {
        match self {
            BackupPlan::Full { .. } => BackupKind::Full,
            BackupPlan::Incremental { .. } => BackupKind::Incremental,
        }
    }

    pub fn parent(&self) -> Option<&BackupId> {
        match self {
            BackupPlan::Full { .. } => None,
            BackupPlan::Incremental { parent, .. } => Some(parent),
        }
    }
}

/// Decide what the next backup should be.
pub fn plan_backup(
    state: &CatalogState,
    cadence: Cadence,
    force_full: bool,
    now: DateTime<Utc>,
) -> BackupPlan {
    if force_full {
        return BackupPlan::Full { reason: FullReason::Forced };
    }
    let Some(full) = state.latest_succeeded(BackupKind::Full) else {
        return BackupPlan::Full { reason: FullReason::NoFullBackup };
    };
    if state.latest_of_kind(BackupKind::Full).map(|r| r.status) == Some(BackupStatus::Failed) {
        return BackupPlan::Full { reason: FullReason::LatestFullFailed };
    }
    let due = cadence.next_full_due(full.created_at);
    if now >= due {
        return BackupPlan::Full { reason: FullReason::Due };
    }
    BackupPlan::Incremental { parent: full.id.clone(), next_full_due: due }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
