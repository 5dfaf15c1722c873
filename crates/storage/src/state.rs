// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized catalog state from log replay

use bm_core::{BackupId, BackupKind, BackupRecord, BackupStatus, CatalogEvent};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Why a record's ancestry does not end in a usable full backup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    #[error("backup {0} is not in the catalog")]
    Missing(BackupId),
    #[error("backup {id} is {status}, not succeeded")]
    NotSucceeded { id: BackupId, status: BackupStatus },
    #[error("incremental backup {0} has no parent")]
    Orphan(BackupId),
    #[error("lineage of backup {0} loops back on itself")]
    Cycle(BackupId),
}

/// Every backup record, in the order their `backup:started` events were
/// appended.
#[derive(Debug, Default, Clone)]
pub struct CatalogState {
    records: Vec<BackupRecord>,
    index: HashMap<BackupId, usize>,
}

impl CatalogState {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a CatalogEvent>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply_event(event);
        }
        state
    }

    /// Apply an event to derive state.
    ///
    /// Handlers are idempotent: a repeated start is ignored, and only the
    /// first terminal event for a record takes effect.
    pub fn apply_event(&mut self, event: &CatalogEvent) {
        match event {
            CatalogEvent::BackupStarted { record } => {
                if self.index.contains_key(&record.id) {
                    return;
                }
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record.clone());
            }

            CatalogEvent::BackupSucceeded { id, storage_location, checksum, finished_at } => {
                if let Some(record) = self.pending_mut(id) {
                    record.status = BackupStatus::Succeeded;
                    record.storage_location = Some(storage_location.clone());
                    record.checksum = checksum.clone();
                    record.finished_at = Some(*finished_at);
                }
            }

            CatalogEvent::BackupFailed { id, reason, finished_at } => {
                if let Some(record) = self.pending_mut(id) {
                    record.status = BackupStatus::Failed;
                    record.failure = Some(reason.clone());
                    record.finished_at = Some(*finished_at);
                }
            }
        }
    }

    fn pending_mut(&mut self, id: &BackupId) -> Option<&mut BackupRecord> {
        let idx = *self.index.get(id)?;
        self.records.get_mut(idx).filter(|r| r.is_pending())
    }

    pub fn get(&self, id: &str) -> Option<&BackupRecord> {
        self.index.get(id).and_then(|idx| self.records.get(*idx))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records ordered by `created_at`, ties broken by append order.
    pub fn list(&self) -> Vec<&BackupRecord> {
        let mut records: Vec<&BackupRecord> = self.records.iter().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Records still waiting on an outcome.
    pub fn pending(&self) -> Vec<&BackupRecord> {
        self.records.iter().filter(|r| r.is_pending()).collect()
    }

    /// Most recent succeeded record of `kind` by `created_at`.
    pub fn latest_succeeded(&self, kind: BackupKind) -> Option<&BackupRecord> {
        self.latest_where(|r| r.kind == kind && r.is_succeeded())
    }

    /// Most recent record of `kind` regardless of status.
    pub fn latest_of_kind(&self, kind: BackupKind) -> Option<&BackupRecord> {
        self.latest_where(|r| r.kind == kind)
    }

    fn latest_where(&self, pred: impl Fn(&BackupRecord) -> bool) -> Option<&BackupRecord> {
        // Later append wins a created_at tie, matching list() order.
        self.records.iter().filter(|r| pred(r)).fold(None, |best, r| match best {
            Some(b) if b.created_at > r.created_at => Some(b),
            _ => Some(r),
        })
    }

    /// Follow parent links from `id` to the full backup at the root.
    ///
    /// Every record on the way, `id` included, must be succeeded.
    pub fn lineage_root(&self, id: &str) -> Result<&BackupRecord, LineageError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = self.get(id).ok_or_else(|| LineageError::Missing(BackupId::new(id)))?;
        loop {
            if !current.is_succeeded() {
                return Err(LineageError::NotSucceeded {
                    id: current.id.clone(),
                    status: current.status,
                });
            }
            if current.kind == BackupKind::Full {
                return Ok(current);
            }
            if !seen.insert(current.id.as_str()) {
                return Err(LineageError::Cycle(current.id.clone()));
            }
            let parent =
                current.parent_id.as_ref().ok_or_else(|| LineageError::Orphan(current.id.clone()))?;
            current = self.get(parent).ok_or_else(|| LineageError::Missing(parent.clone()))?;
        }
    }

    /// Succeeded incrementals whose lineage resolves to `full_id`, ascending
    /// `created_at`.
    pub fn chain_after(&self, full_id: &str) -> Vec<&BackupRecord> {
        self.list()
            .into_iter()
            .filter(|r| r.kind == BackupKind::Incremental && r.is_succeeded())
            .filter(|r| self.lineage_root(&r.id).map(|root| root.id == full_id).unwrap_or(false))
            .collect()
    }

    /// Newest `created_at` of any record, whatever its status.
    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.created_at).max()
    }

    /// A `created_at` for a new record that sorts strictly after every
    /// existing one, even if the wall clock stepped backwards.
    pub fn next_created_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.latest_created_at() {
            Some(last) if last >= now => last + Duration::milliseconds(1),
            _ => now,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
