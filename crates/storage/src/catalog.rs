// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable backup catalog.
//!
//! State is never cached between calls: every query replays the log, and
//! every mutation replays, validates and appends while holding an exclusive
//! lock on `catalog.lock`. Two processes sharing a catalog directory
//! therefore always decide against the same history.

use crate::log::{CatalogLog, LogError};
use crate::state::CatalogState;
use bm_core::{BackupId, BackupKind, BackupRecord, BackupStatus, CatalogEvent};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const LOG_FILE: &str = "catalog.jsonl";
const LOCK_FILE: &str = "catalog.lock";
const RUN_LOCK_FILE: &str = "run.lock";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("backup {0} is already pending")]
    PendingExists(BackupId),
    #[error("another run holds the run lock ({0})")]
    RunLocked(io::Error),
    #[error("backup {0} already exists")]
    DuplicateId(BackupId),
    #[error("backup {0} not found")]
    UnknownBackup(BackupId),
    #[error("parent {parent} of backup {id} is not usable: {reason}")]
    UnusableParent { id: BackupId, parent: BackupId, reason: String },
    #[error("backup {id}: {reason}")]
    InvalidRecord { id: BackupId, reason: String },
    #[error("backup {id} created at {created_at} does not sort after the latest record ({latest})")]
    OutOfOrder { id: BackupId, created_at: DateTime<Utc>, latest: DateTime<Utc> },
    #[error("backup {id} is already {status}")]
    AlreadyClosed { id: BackupId, status: BackupStatus },
}

impl CatalogError {
    /// Errors caused by another run rather than by the catalog itself.
    pub fn is_concurrency(&self) -> bool {
        matches!(self, CatalogError::PendingExists(_) | CatalogError::RunLocked(_))
    }
}

/// Held for the duration of one backup or restore run.
///
/// The lock is released when the guard is dropped (or the process dies).
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

/// Catalog rooted at a state directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
}

impl Catalog {
    /// Open (creating if needed) the catalog in `dir`.
    ///
    /// Replays the log once so a damaged catalog is reported up front.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let catalog = Self { dir };
        let state = catalog.state()?;
        info!(dir = %catalog.dir.display(), records = state.len(), "catalog opened");
        Ok(catalog)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Current state, replayed from disk under a shared lock.
    pub fn state(&self) -> Result<CatalogState, CatalogError> {
        let lock = self.lock_file()?;
        FileExt::lock_shared(&lock)?;
        let entries = CatalogLog::read(&self.log_path())?;
        FileExt::unlock(&lock)?;
        Ok(CatalogState::from_events(entries.iter().map(|e| &e.event)))
    }

    pub fn get(&self, id: &str) -> Result<Option<BackupRecord>, CatalogError> {
        Ok(self.state()?.get(id).cloned())
    }

    pub fn list(&self) -> Result<Vec<BackupRecord>, CatalogError> {
        Ok(self.state()?.list().into_iter().cloned().collect())
    }

    pub fn latest_succeeded(&self, kind: BackupKind) -> Result<Option<BackupRecord>, CatalogError> {
        Ok(self.state()?.latest_succeeded(kind).cloned())
    }

    pub fn chain_after(&self, full_id: &str) -> Result<Vec<BackupRecord>, CatalogError> {
        Ok(self.state()?.chain_after(full_id).into_iter().cloned().collect())
    }

    /// Durably record the start of a backup attempt.
    ///
    /// Appends iff no Pending record exists. The record must be Pending, its
    /// id unused, its `created_at` later than every existing record's, and an
    /// incremental's parent must exist and be Succeeded.
    pub fn begin(&self, record: &BackupRecord) -> Result<(), CatalogError> {
        self.mutate(|state| {
            if let Some(pending) = state.pending().first() {
                return Err(CatalogError::PendingExists(pending.id.clone()));
            }
            validate_new(state, record)?;
            Ok(CatalogEvent::BackupStarted { record: record.clone() })
        })?;
        info!(
            backup_id = %record.id,
            kind = %record.kind,
            parent = ?record.parent_id,
            "backup recorded as pending"
        );
        Ok(())
    }

    /// Close a Pending record as Succeeded.
    pub fn succeed(
        &self,
        id: &BackupId,
        storage_location: &str,
        checksum: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<BackupRecord, CatalogError> {
        let record = self.mutate(|state| {
            require_pending(state, id)?;
            Ok(CatalogEvent::BackupSucceeded {
                id: id.clone(),
                storage_location: storage_location.to_string(),
                checksum: checksum.map(str::to_string),
                finished_at,
            })
        })?;
        info!(backup_id = %id, storage_location, "backup recorded as succeeded");
        Ok(record)
    }

    /// Close a Pending record as Failed.
    pub fn fail(
        &self,
        id: &BackupId,
        reason: &str,
        finished_at: DateTime<Utc>,
    ) -> Result<BackupRecord, CatalogError> {
        let record = self.mutate(|state| {
            require_pending(state, id)?;
            Ok(CatalogEvent::BackupFailed {
                id: id.clone(),
                reason: reason.to_string(),
                finished_at,
            })
        })?;
        info!(backup_id = %id, reason, "backup recorded as failed");
        Ok(record)
    }

    /// Take the run lock, failing immediately if another run holds it.
    pub fn run_lock(&self) -> Result<RunLock, CatalogError> {
        // Don't truncate before the lock is held: the holder's pid is in there.
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(RUN_LOCK_FILE))?;
        file.try_lock_exclusive().map_err(CatalogError::RunLocked)?;

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(RunLock { _file: file })
    }

    /// Replay under the exclusive lock, build the next event, append it and
    /// return the affected record as it now stands.
    fn mutate(
        &self,
        decide: impl FnOnce(&CatalogState) -> Result<CatalogEvent, CatalogError>,
    ) -> Result<BackupRecord, CatalogError> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let (mut log, entries) = CatalogLog::open(&self.log_path())?;
        let mut state = CatalogState::from_events(entries.iter().map(|e| &e.event));
        let event = decide(&state)?;
        log.append(&event)?;
        state.apply_event(&event);

        FileExt::unlock(&lock)?;
        let id = event.backup_id();
        state.get(id).cloned().ok_or_else(|| CatalogError::UnknownBackup(id.clone()))
    }

    fn lock_file(&self) -> Result<File, CatalogError> {
        Ok(OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?)
    }
}

fn validate_new(state: &CatalogState, record: &BackupRecord) -> Result<(), CatalogError> {
    let invalid = |reason: &str| {
        Err(CatalogError::InvalidRecord { id: record.id.clone(), reason: reason.to_string() })
    };

    if state.get(&record.id).is_some() {
        return Err(CatalogError::DuplicateId(record.id.clone()));
    }
    if !record.is_pending() {
        return invalid("new records must be pending");
    }
    if record.storage_location.is_some() {
        return invalid("pending records have no storage location");
    }
    // Restore chains are cut at the target's created_at, so it must strictly increase.
    if let Some(latest) = state.latest_created_at().filter(|latest| record.created_at <= *latest) {
        return Err(CatalogError::OutOfOrder { id: record.id.clone(), created_at: record.created_at, latest });
    }

    match (record.kind, &record.parent_id) {
        (BackupKind::Full, None) => Ok(()),
        (BackupKind::Full, Some(_)) => invalid("full backups have no parent"),
        (BackupKind::Incremental, None) => invalid("incremental backups need a parent"),
        (BackupKind::Incremental, Some(parent)) => {
            let unusable = |reason: String| CatalogError::UnusableParent {
                id: record.id.clone(),
                parent: parent.clone(),
                reason,
            };
            match state.get(parent) {
                None => Err(unusable("not in the catalog".to_string())),
                Some(p) if !p.is_succeeded() => Err(unusable(format!("status is {}", p.status))),
                Some(_) => {
                    state.lineage_root(parent).map(|_| ()).map_err(|e| unusable(e.to_string()))
                }
            }
        }
    }
}

fn require_pending(state: &CatalogState, id: &BackupId) -> Result<(), CatalogError> {
    match state.get(id) {
        None => Err(CatalogError::UnknownBackup(id.clone())),
        Some(r) if r.is_pending() => Ok(()),
        Some(r) => Err(CatalogError::AlreadyClosed { id: id.clone(), status: r.status }),
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
