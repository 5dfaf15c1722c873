// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact naming, staging directories and verified downloads.

use crate::error::RunError;
use crate::retry::RetryPolicy;
use bm_adapters::{join_key, sha256_file, ArchiveFormat, ObjectStoreGateway, TransferError};
use bm_core::{BackupId, BackupRecord};
use bm_storage::CatalogError;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Object-store location of a backup: `<prefix><id>/`.
pub fn storage_location(prefix: &str, id: &BackupId) -> String {
    format!("{}/", join_key(prefix, id))
}

/// Remove `dir` if present and create it empty.
pub(crate) fn reset_dir(dir: &Path) -> io::Result<()> {
    remove_dir(dir)?;
    std::fs::create_dir_all(dir)
}

/// Remove `dir` and everything under it; absent is fine.
pub(crate) fn remove_dir(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Run filesystem-heavy work (archiving, hashing) off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, RunError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RunError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| RunError::Io(io::Error::other(e)))?
}

/// Download the artifact of a succeeded `record` into `dir` and verify it
/// against the recorded checksum. Download and verification are retried
/// together.
pub(crate) async fn fetch_artifact<S: ObjectStoreGateway>(
    store: &S,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    bucket: &str,
    record: &BackupRecord,
    dir: &Path,
) -> Result<PathBuf, RunError> {
    let location = record.storage_location.as_deref().ok_or_else(|| {
        RunError::Catalog(CatalogError::InvalidRecord {
            id: record.id.clone(),
            reason: "no storage location recorded".to_string(),
        })
    })?;
    let expected = record.checksum.as_deref();
    let id = record.id.as_str();

    let archive = retry
        .run("download", cancel, TransferError::is_retryable, move || async move {
            reset_dir(dir).map_err(|source| TransferError::Io { path: dir.to_path_buf(), source })?;
            let files = store.download(bucket, location, dir).await?;
            let archive = pick_artifact(&files, id).ok_or_else(|| TransferError::NotFound {
                bucket: bucket.to_string(),
                prefix: location.to_string(),
            })?;
            if let Some(expected) = expected {
                verify_checksum(&archive, expected).await?;
            }
            Ok::<_, TransferError>(archive)
        })
        .await?;
    tracing::info!(backup_id = %record.id, location, archive = %archive.display(), "artifact downloaded");
    Ok(archive)
}

/// The archive among downloaded files, preferring one named after `id`.
fn pick_artifact(files: &[PathBuf], id: &str) -> Option<PathBuf> {
    let archives: Vec<&PathBuf> =
        files.iter().filter(|p| ArchiveFormat::from_path(p).is_some()).collect();
    archives
        .iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(id)))
        .or_else(|| archives.first())
        .map(|p| p.to_path_buf())
}

async fn verify_checksum(path: &Path, expected: &str) -> Result<(), TransferError> {
    let owned = path.to_path_buf();
    let io_err = |source| TransferError::Io { path: path.to_path_buf(), source };
    let actual = tokio::task::spawn_blocking(move || sha256_file(&owned))
        .await
        .map_err(|e| io_err(io::Error::other(e)))?
        .map_err(io_err)?;
    if actual != expected {
        return Err(TransferError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
