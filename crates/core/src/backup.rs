// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup records and their lifecycle.
//!
//! A record is created `Pending` right before capture starts and moves to
//! exactly one terminal state. Terminal records are never changed again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::BackupId;

/// Full snapshot or changes relative to a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Full,
    Incremental,
}

impl BackupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupKind::Full => "full",
            BackupKind::Incremental => "incremental",
        }
    }

    /// Short prefix used when generating ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            BackupKind::Full => "full",
            BackupKind::Incremental => "inc",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    Succeeded,
    Failed,
}

impl BackupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupStatus::Pending => "pending",
            BackupStatus::Succeeded => "succeeded",
            BackupStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BackupStatus::Pending)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: BackupId,
    pub kind: BackupKind,
    /// Set iff `kind` is `Incremental`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BackupId>,
    pub created_at: DateTime<Utc>,
    pub status: BackupStatus,
    /// Object-store prefix of the artifact. Set iff `status` is `Succeeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    /// SHA-256 of the uploaded artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackupRecord {
    pub fn pending_full(id: BackupId, created_at: DateTime<Utc>) -> Self {
        Self::pending(id, BackupKind::Full, None, created_at)
    }

    pub fn pending_incremental(id: BackupId, parent: BackupId, created_at: DateTime<Utc>) -> Self {
        Self::pending(id, BackupKind::Incremental, Some(parent), created_at)
    }

    fn pending(
        id: BackupId,
        kind: BackupKind,
        parent_id: Option<BackupId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            parent_id,
            created_at,
            status: BackupStatus::Pending,
            storage_location: None,
            checksum: None,
            failure: None,
            finished_at: None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == BackupStatus::Succeeded
    }

    pub fn is_pending(&self) -> bool {
        self.status == BackupStatus::Pending
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
