// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog events.
//!
//! The catalog is an append-only log of these facts. A record's current state
//! is derived by replaying them: `backup:started` creates it as Pending, and
//! exactly one of `backup:succeeded` or `backup:failed` closes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backup::BackupRecord;
use crate::id::BackupId;

/// Serializes with `{"type": "backup:started", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    #[serde(rename = "backup:started")]
    BackupStarted { record: BackupRecord },

    #[serde(rename = "backup:succeeded")]
    BackupSucceeded {
        id: BackupId,
        storage_location: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
        finished_at: DateTime<Utc>,
    },

    #[serde(rename = "backup:failed")]
    BackupFailed { id: BackupId, reason: String, finished_at: DateTime<Utc> },
}

impl CatalogEvent {
    pub fn backup_id(&self) -> &BackupId {
        match self {
            CatalogEvent::BackupStarted { record } => &record.id,
            CatalogEvent::BackupSucceeded { id, .. } | CatalogEvent::BackupFailed { id, .. } => id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatalogEvent::BackupStarted { .. } => "backup:started",
            CatalogEvent::BackupSucceeded { .. } => "backup:succeeded",
            CatalogEvent::BackupFailed { .. } => "backup:failed",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
