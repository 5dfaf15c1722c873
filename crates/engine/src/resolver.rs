// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore chain resolution.
//!
//! A chain is one succeeded full followed by the succeeded incrementals of
//! its line, ascending by `created_at`, truncated at the requested target.

use bm_core::{BackupId, BackupKind, BackupRecord, BackupStatus, RestoreRequest};
use bm_storage::{CatalogState, LineageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("backup {0} not found")]
    UnknownId(BackupId),
    #[error("backup {id} is {status}, only succeeded backups can be restored")]
    NotSucceeded { id: BackupId, status: BackupStatus },
    #[error("no succeeded full backup")]
    NoFullBackup,
    #[error("no succeeded incremental backup")]
    NoIncrementalBackup,
    #[error("lineage of {id} is broken: {source}")]
    BrokenLineage { id: BackupId, source: LineageError },
}

/// Resolve `request` to the ordered chain of records to restore.
pub fn resolve_chain(
    state: &CatalogState,
    request: &RestoreRequest,
) -> Result<Vec<BackupRecord>, ResolveError> {
    let target = match request {
        RestoreRequest::ById(id) => {
            let record = state.get(id).ok_or_else(|| ResolveError::UnknownId(id.clone()))?;
            if !record.is_succeeded() {
                return Err(ResolveError::NotSucceeded { id: id.clone(), status: record.status });
            }
            record
        }
        RestoreRequest::LatestFull => {
            state.latest_succeeded(BackupKind::Full).ok_or(ResolveError::NoFullBackup)?
        }
        RestoreRequest::LatestIncremental => match state.latest_succeeded(BackupKind::Incremental) {
            Some(record) => record,
            None if state.latest_succeeded(BackupKind::Full).is_none() => {
                return Err(ResolveError::NoFullBackup)
            }
            None => return Err(ResolveError::NoIncrementalBackup),
        },
    };

    if target.kind == BackupKind::Full {
        return Ok(vec![target.clone()]);
    }

    let root = state
        .lineage_root(&target.id)
        .map_err(|source| ResolveError::BrokenLineage { id: target.id.clone(), source })?;
    let mut chain = vec![root.clone()];
    chain.extend(
        state
            .chain_after(&root.id)
            .into_iter()
            .filter(|r| r.created_at <= target.created_at)
            .cloned(),
    );
    Ok(chain)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
