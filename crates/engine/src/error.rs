// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run outcomes that are not success.

use crate::resolver::ResolveError;
use crate::retry::RetryError;
use bm_adapters::{ArchiveError, CaptureError, ServerError, TransferError};
use bm_core::{BackupId, BackupKind};
use bm_storage::CatalogError;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The step a run was executing when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Lock,
    Record,
    FetchBase,
    Capture,
    Compress,
    Upload,
    Finalize,
    Resolve,
    Download,
    Decompress,
    Prepare,
    StopServer,
    Materialize,
    Ownership,
    StartServer,
    Inventory,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Lock => "lock",
            Step::Record => "record",
            Step::FetchBase => "fetch_base",
            Step::Capture => "capture",
            Step::Compress => "compress",
            Step::Upload => "upload",
            Step::Finalize => "finalize",
            Step::Resolve => "resolve",
            Step::Download => "download",
            Step::Decompress => "decompress",
            Step::Prepare => "prepare",
            Step::StopServer => "stop_server",
            Step::Materialize => "materialize",
            Step::Ownership => "ownership",
            Step::StartServer => "start_server",
            Step::Inventory => "inventory",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("another backup or restore is in progress: {0}")]
    Concurrency(CatalogError),
    #[error("catalog error: {0}")]
    Catalog(CatalogError),
    #[error("chain resolution failed: {0}")]
    Resolution(#[from] ResolveError),
    #[error("capture failed after {attempts} attempt(s): {source}")]
    Capture { attempts: u32, source: CaptureError },
    #[error("prepare failed: {0}")]
    Prepare(CaptureError),
    #[error("transfer failed after {attempts} attempt(s): {source}")]
    Transfer { attempts: u32, source: TransferError },
    #[error("materialize failed: {0}")]
    Materialize(CaptureError),
    #[error("server control failed after {attempts} attempt(s): {source}")]
    Server { attempts: u32, source: ServerError },
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// Stable name of the error class, used in structured output.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Concurrency(_) => "concurrency",
            RunError::Catalog(_) => "catalog",
            RunError::Resolution(_) => "resolution",
            RunError::Capture { .. } => "capture",
            RunError::Prepare(_) | RunError::Materialize(_) => "materialize",
            RunError::Transfer { .. } => "transfer",
            RunError::Server { .. } => "server",
            RunError::Archive(_) | RunError::Io(_) => "internal",
            RunError::Cancelled => "cancelled",
        }
    }

    /// Wrap a non-retried capture tool error.
    pub(crate) fn tool(error: CaptureError, wrap: fn(CaptureError) -> RunError) -> Self {
        if error.is_cancelled() {
            RunError::Cancelled
        } else {
            wrap(error)
        }
    }
}

impl From<CatalogError> for RunError {
    fn from(error: CatalogError) -> Self {
        if error.is_concurrency() {
            RunError::Concurrency(error)
        } else {
            RunError::Catalog(error)
        }
    }
}

impl From<RetryError<CaptureError>> for RunError {
    fn from(error: RetryError<CaptureError>) -> Self {
        match error {
            RetryError::Failed { error, .. } if error.is_cancelled() => RunError::Cancelled,
            RetryError::Failed { attempts, error } => RunError::Capture { attempts, source: error },
            RetryError::Cancelled { .. } => RunError::Cancelled,
        }
    }
}

impl From<RetryError<TransferError>> for RunError {
    fn from(error: RetryError<TransferError>) -> Self {
        match error {
            RetryError::Failed { attempts, error } => RunError::Transfer { attempts, source: error },
            RetryError::Cancelled { .. } => RunError::Cancelled,
        }
    }
}

impl From<RetryError<ServerError>> for RunError {
    fn from(error: RetryError<ServerError>) -> Self {
        match error {
            RetryError::Failed { error, .. } if error.is_cancelled() => RunError::Cancelled,
            RetryError::Failed { attempts, error } => RunError::Server { attempts, source: error },
            RetryError::Cancelled { .. } => RunError::Cancelled,
        }
    }
}

/// A backup run that stopped before recording success.
#[derive(Debug, Error)]
pub struct BackupFailure {
    pub step: Step,
    /// Set once the pending record exists; that record is now Failed.
    pub backup_id: Option<BackupId>,
    /// Set once the scheduler has picked full or incremental.
    pub kind: Option<BackupKind>,
    pub error: RunError,
}

impl fmt::Display for BackupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.backup_id, self.kind) {
            (Some(id), Some(kind)) => write!(f, "{} backup {} failed", kind, id)?,
            (Some(id), None) => write!(f, "backup {} failed", id)?,
            (None, Some(kind)) => write!(f, "{} backup failed", kind)?,
            (None, None) => f.write_str("backup failed")?,
        }
        write!(f, " at step {}: {}", self.step, self.error)
    }
}

/// A restore run that stopped part way.
#[derive(Debug, Error)]
pub struct RestoreFailure {
    pub step: Step,
    /// Resolved chain, empty if resolution failed.
    pub chain: Vec<BackupId>,
    /// Incrementals already prepared into the full.
    pub applied_incrementals: usize,
    /// Staging directory kept for inspection.
    pub staging: Option<PathBuf>,
    pub error: RunError,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "restore failed at step {}", self.step)?;
        if !self.chain.is_empty() {
            let chain: Vec<&str> = self.chain.iter().map(|id| id.as_str()).collect();
            write!(
                f,
                " (chain {}, {} of {} incremental(s) applied)",
                chain.join(" -> "),
                self.applied_incrementals,
                self.chain.len().saturating_sub(1)
            )?;
        }
        write!(f, ": {}", self.error)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
