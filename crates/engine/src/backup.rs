// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup orchestration: plan, record, capture, archive, upload, close.

use crate::artifact::{blocking, fetch_artifact, remove_dir, reset_dir, storage_location};
use crate::error::{BackupFailure, RunError, Step};
use crate::retry::RetryPolicy;
use crate::scheduler::{plan_backup, BackupPlan, FullReason};
use bm_adapters::capture::op;
use bm_adapters::{
    compress_dir, decompress, sha256_file, ArchiveFormat, CaptureError, CaptureTool,
    ObjectStoreGateway, TransferError,
};
use bm_core::{BackupId, BackupKind, BackupRecord, Cadence, Clock};
use bm_storage::{Catalog, CatalogError, CatalogState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reason recorded on pending records left behind by a dead run.
pub const ABANDONED_REASON: &str = "abandoned: the run that started it ended without an outcome";

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub bucket: String,
    pub full_prefix: String,
    pub incremental_prefix: String,
    pub cadence: Cadence,
    /// Parent of per-run staging directories.
    pub staging_root: PathBuf,
    pub archive_format: ArchiveFormat,
}

impl BackupSettings {
    pub fn prefix_for(&self, kind: BackupKind) -> &str {
        match kind {
            BackupKind::Full => &self.full_prefix,
            BackupKind::Incremental => &self.incremental_prefix,
        }
    }
}

/// Adapters a backup run needs.
pub struct BackupDeps<T, S> {
    pub capture: T,
    pub store: S,
}

/// A successful backup run.
#[derive(Debug, Clone, Serialize)]
pub struct BackupOutcome {
    pub backup_id: BackupId,
    pub kind: BackupKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BackupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_reason: Option<FullReason>,
    pub storage_location: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Pending records from dead runs that this run closed as failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub abandoned: Vec<BackupId>,
}

/// What a finished capture left in the object store.
struct Artifact {
    location: String,
    checksum: String,
    size: u64,
}

fn at<E: Into<RunError>>(step: Step) -> impl FnOnce(E) -> (Step, RunError) {
    move |e| (step, e.into())
}

/// Close every pending record as failed.
///
/// Only sound while holding the run lock: a pending record seen then cannot
/// belong to a live run.
pub fn close_abandoned(catalog: &Catalog, now: DateTime<Utc>) -> Result<Vec<BackupId>, CatalogError> {
    let pending: Vec<BackupId> =
        catalog.state()?.pending().into_iter().map(|r| r.id.clone()).collect();
    for id in &pending {
        warn!(backup_id = %id, "closing abandoned pending backup");
        catalog.fail(id, ABANDONED_REASON, now)?;
    }
    Ok(pending)
}

pub struct BackupOrchestrator<T, S, C: Clock> {
    catalog: Catalog,
    capture: T,
    store: S,
    clock: C,
    settings: BackupSettings,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<T, S, C> BackupOrchestrator<T, S, C>
where
    T: CaptureTool,
    S: ObjectStoreGateway,
    C: Clock,
{
    pub fn new(
        catalog: Catalog,
        deps: BackupDeps<T, S>,
        clock: C,
        settings: BackupSettings,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self { catalog, capture: deps.capture, store: deps.store, clock, settings, retry, cancel }
    }

    /// Run one backup. On failure after the pending record was written, the
    /// record is closed as failed with the cause before returning.
    pub async fn run(&self, force_full: bool) -> Result<BackupOutcome, BackupFailure> {
        let started = Instant::now();
        let before_record = |step: Step| {
            move |e: CatalogError| BackupFailure { step, backup_id: None, kind: None, error: e.into() }
        };

        let _run_lock = self.catalog.run_lock().map_err(before_record(Step::Lock))?;
        let abandoned =
            close_abandoned(&self.catalog, self.clock.now()).map_err(before_record(Step::Record))?;
        let state = self.catalog.state().map_err(before_record(Step::Record))?;

        let now = self.clock.now();
        let plan = plan_backup(&state, self.settings.cadence, force_full, now);
        let created_at = state.next_created_at(now);
        let kind = plan.kind();
        let id = BackupId::generate(kind, created_at);
        let record = match &plan {
            BackupPlan::Full { .. } => BackupRecord::pending_full(id.clone(), created_at),
            BackupPlan::Incremental { parent, .. } => {
                BackupRecord::pending_incremental(id.clone(), parent.clone(), created_at)
            }
        };
        self.catalog.begin(&record).map_err(|e| BackupFailure {
            step: Step::Record,
            backup_id: None,
            kind: Some(kind),
            error: e.into(),
        })?;
        match &plan {
            BackupPlan::Full { reason } => info!(backup_id = %id, %reason, "starting full backup"),
            BackupPlan::Incremental { parent, next_full_due } => {
                info!(backup_id = %id, parent = %parent, %next_full_due, "starting incremental backup")
            }
        }

        let staging = self.settings.staging_root.join(id.as_str());
        let result = self.execute(&record, &state, &staging).await;
        if let Err(e) = remove_dir(&staging) {
            warn!(staging = %staging.display(), error = %e, "failed to remove staging directory");
        }

        let outcome = match result {
            Ok(artifact) => self
                .catalog
                .succeed(&id, &artifact.location, Some(&artifact.checksum), self.clock.now())
                .map(|_| artifact)
                .map_err(at(Step::Finalize)),
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(artifact) => {
                info!(
                    backup_id = %id,
                    %kind,
                    location = %artifact.location,
                    size_bytes = artifact.size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "backup succeeded"
                );
                Ok(BackupOutcome {
                    backup_id: id,
                    kind,
                    parent_id: record.parent_id,
                    full_reason: match plan {
                        BackupPlan::Full { reason } => Some(reason),
                        BackupPlan::Incremental { .. } => None,
                    },
                    storage_location: artifact.location,
                    checksum: artifact.checksum,
                    size_bytes: artifact.size,
                    created_at,
                    abandoned,
                })
            }
            Err((step, error)) => {
                let reason = format!("{}: {}", step, error);
                if let Err(e) = self.catalog.fail(&id, &reason, self.clock.now()) {
                    error!(backup_id = %id, error = %e, "could not record backup failure");
                }
                error!(backup_id = %id, %kind, %step, error = %error, "backup failed");
                Err(BackupFailure { step, backup_id: Some(id), kind: Some(kind), error })
            }
        }
    }

    fn checkpoint(&self) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(())
    }

    async fn execute(
        &self,
        record: &BackupRecord,
        state: &CatalogState,
        staging: &Path,
    ) -> Result<Artifact, (Step, RunError)> {
        reset_dir(staging).map_err(at(Step::Capture))?;

        let base = match &record.parent_id {
            Some(parent) => {
                self.checkpoint().map_err(at(Step::FetchBase))?;
                Some(self.fetch_base(state, parent, staging).await.map_err(at(Step::FetchBase))?)
            }
            None => None,
        };

        self.checkpoint().map_err(at(Step::Capture))?;
        let target = staging.join(record.id.as_str());
        self.capture(&target, base.as_deref()).await.map_err(at(Step::Capture))?;

        self.checkpoint().map_err(at(Step::Compress))?;
        let archive = staging
            .join("artifact")
            .join(self.settings.archive_format.artifact_name(&record.id));
        let (size, checksum) = self.compress(&target, &archive).await.map_err(at(Step::Compress))?;

        self.checkpoint().map_err(at(Step::Upload))?;
        let location = storage_location(self.settings.prefix_for(record.kind), &record.id);
        self.upload(&archive, &location).await.map_err(at(Step::Upload))?;

        Ok(Artifact { location, checksum, size })
    }

    /// Download and unpack the parent so the capture tool can diff against it.
    async fn fetch_base(
        &self,
        state: &CatalogState,
        parent: &BackupId,
        staging: &Path,
    ) -> Result<PathBuf, RunError> {
        let record = state
            .get(parent)
            .ok_or_else(|| RunError::Catalog(CatalogError::UnknownBackup(parent.clone())))?;
        let archive = fetch_artifact(
            &self.store,
            &self.retry,
            &self.cancel,
            &self.settings.bucket,
            record,
            &staging.join("base-download"),
        )
        .await?;
        let dest = staging.join("base");
        blocking(move || Ok(decompress(&archive, &dest)?)).await
    }

    async fn capture(&self, target: &Path, base: Option<&Path>) -> Result<(), RunError> {
        let capture = &self.capture;
        self.retry
            .run("capture", &self.cancel, CaptureError::is_retryable, move || async move {
                // A failed attempt may leave a partial tree behind.
                remove_dir(target).map_err(|source| CaptureError::Io { operation: op::CAPTURE, source })?;
                match base {
                    Some(base) => capture.capture_incremental(target, base).await,
                    None => capture.capture_full(target).await,
                }
            })
            .await?;
        Ok(())
    }

    /// Archive the captured tree. Returns (size, sha256).
    async fn compress(&self, target: &Path, archive: &Path) -> Result<(u64, String), RunError> {
        let format = self.settings.archive_format;
        let (target, archive) = (target.to_path_buf(), archive.to_path_buf());
        blocking(move || {
            if let Some(dir) = archive.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let size = compress_dir(&target, &archive, format)?;
            let checksum = sha256_file(&archive)?;
            Ok((size, checksum))
        })
        .await
    }

    /// Upload the artifact, then confirm the location lists every key written.
    async fn upload(&self, archive: &Path, location: &str) -> Result<(), RunError> {
        let store = &self.store;
        let bucket = self.settings.bucket.as_str();
        self.retry
            .run("upload", &self.cancel, TransferError::is_retryable, move || async move {
                let written = store.upload(archive, bucket, location).await?;
                let listed = store.list_keys(bucket, location).await?;
                if written.is_empty() || !written.iter().all(|k| listed.contains(k)) {
                    return Err(TransferError::NotFound {
                        bucket: bucket.to_string(),
                        prefix: location.to_string(),
                    });
                }
                Ok::<_, TransferError>(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
