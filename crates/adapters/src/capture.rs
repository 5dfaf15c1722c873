// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup capture tool adapter.
//!
//! The capture tool produces a backup tree (full or relative to a base),
//! prepares it by applying redo logs, and places prepared files into the
//! server's data directory. The bytes it writes are opaque to this crate.

use crate::subprocess::{display_command, run_with_timeout, stderr_tail, SubprocessError};
use async_trait::async_trait;
use bm_core::MaterializeMethod;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Operation names used in errors, logs and fake failure injection.
pub mod op {
    pub const CAPTURE: &str = "capture";
    pub const PREPARE: &str = "prepare";
    pub const MATERIALIZE: &str = "materialize";
    pub const OWNERSHIP: &str = "ownership";
}

/// Errors from capture tool operations
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("{operation} exited with code {code:?}: {stderr}")]
    Failed { operation: &'static str, code: Option<i32>, stderr: String },
    #[error("{operation} io error: {source}")]
    Io { operation: &'static str, source: io::Error },
}

impl CaptureError {
    /// Whether another attempt could succeed.
    ///
    /// Non-zero exits and timeouts are retried. Cancellation, a missing
    /// binary, and local io errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::Subprocess(SubprocessError::Timeout { .. }) => true,
            CaptureError::Subprocess(_) => false,
            CaptureError::Failed { .. } => true,
            CaptureError::Io { .. } => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CaptureError::Subprocess(SubprocessError::Cancelled { .. }))
    }
}

/// Adapter for the external backup capture tool
#[async_trait]
pub trait CaptureTool: Clone + Send + Sync + 'static {
    /// Capture a full snapshot into `target`.
    async fn capture_full(&self, target: &Path) -> Result<(), CaptureError>;

    /// Capture changes since the backup extracted at `base` into `target`.
    async fn capture_incremental(&self, target: &Path, base: &Path) -> Result<(), CaptureError>;

    /// Apply redo logs to `target`, then merge each incremental in order.
    async fn prepare(&self, target: &Path, incrementals: &[PathBuf]) -> Result<(), CaptureError>;

    /// Place the prepared tree into the data directory.
    async fn materialize(&self, prepared: &Path, method: MaterializeMethod) -> Result<(), CaptureError>;

    /// Restore ownership of the data directory after materialize.
    async fn reconcile_ownership(&self) -> Result<(), CaptureError>;
}

/// Connection and layout settings for `mariabackup`.
#[derive(Debug, Clone)]
pub struct MariaBackupConfig {
    pub binary: PathBuf,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub datadir: PathBuf,
    pub innodb_data_home_dir: Option<PathBuf>,
    pub innodb_log_group_home_dir: Option<PathBuf>,
    /// `user:group` for the restored data directory; `None` skips chown.
    pub owner: Option<String>,
    pub timeout: Duration,
}

/// Capture tool backed by the `mariabackup` binary.
#[derive(Debug, Clone)]
pub struct MariaBackup {
    config: MariaBackupConfig,
    cancel: CancellationToken,
}

impl MariaBackup {
    pub fn new(config: MariaBackupConfig) -> Self {
        Self { config, cancel: CancellationToken::new() }
    }

    /// Kill running subprocesses when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &MariaBackupConfig {
        &self.config
    }

    pub(crate) fn backup_args(&self, target: &Path, base: Option<&Path>) -> Vec<String> {
        let c = &self.config;
        let mut args = vec!["--backup".to_string(), format!("--target-dir={}", target.display())];
        if let Some(base) = base {
            args.push(format!("--incremental-basedir={}", base.display()));
        }
        args.push(format!("--host={}", c.host));
        args.push(format!("--port={}", c.port));
        args.push(format!("--user={}", c.user));
        args.push(format!("--password={}", c.password));
        args
    }

    pub(crate) fn prepare_args(target: &Path, incremental: Option<&Path>) -> Vec<String> {
        let mut args = vec!["--prepare".to_string(), format!("--target-dir={}", target.display())];
        if let Some(dir) = incremental {
            args.push(format!("--incremental-dir={}", dir.display()));
        }
        args
    }

    pub(crate) fn materialize_args(&self, prepared: &Path, method: MaterializeMethod) -> Vec<String> {
        let c = &self.config;
        let flag = match method {
            MaterializeMethod::Copy => "--copy-back",
            MaterializeMethod::Move => "--move-back",
        };
        let mut args = vec![
            flag.to_string(),
            format!("--target-dir={}", prepared.display()),
            format!("--datadir={}", c.datadir.display()),
        ];
        if let Some(dir) = &c.innodb_data_home_dir {
            args.push(format!("--innodb-data-home-dir={}", dir.display()));
        }
        if let Some(dir) = &c.innodb_log_group_home_dir {
            args.push(format!("--innodb-log-group-home-dir={}", dir.display()));
        }
        args
    }

    /// Directories whose ownership is reset after a restore.
    fn owned_dirs(&self) -> Vec<&Path> {
        let c = &self.config;
        let mut dirs = vec![c.datadir.as_path()];
        for dir in [&c.innodb_data_home_dir, &c.innodb_log_group_home_dir].into_iter().flatten() {
            if !dirs.contains(&dir.as_path()) {
                dirs.push(dir.as_path());
            }
        }
        dirs
    }

    async fn run(
        &self,
        operation: &'static str,
        program: &Path,
        args: Vec<String>,
    ) -> Result<(), CaptureError> {
        tracing::info!(operation, command = %display_command(program, &args), "running capture tool");
        let mut cmd = Command::new(program);
        cmd.args(&args);
        let output = run_with_timeout(cmd, self.config.timeout, operation, &self.cancel).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = stderr_tail(&output);
        tracing::warn!(operation, code = ?output.status.code(), %stderr, "capture tool failed");
        Err(CaptureError::Failed { operation, code: output.status.code(), stderr })
    }
}

#[async_trait]
impl CaptureTool for MariaBackup {
    async fn capture_full(&self, target: &Path) -> Result<(), CaptureError> {
        let args = self.backup_args(target, None);
        self.run(op::CAPTURE, &self.config.binary, args).await
    }

    async fn capture_incremental(&self, target: &Path, base: &Path) -> Result<(), CaptureError> {
        let args = self.backup_args(target, Some(base));
        self.run(op::CAPTURE, &self.config.binary, args).await
    }

    async fn prepare(&self, target: &Path, incrementals: &[PathBuf]) -> Result<(), CaptureError> {
        if incrementals.is_empty() {
            return self.run(op::PREPARE, &self.config.binary, Self::prepare_args(target, None)).await;
        }
        for dir in incrementals {
            let args = Self::prepare_args(target, Some(dir));
            self.run(op::PREPARE, &self.config.binary, args).await?;
        }
        Ok(())
    }

    async fn materialize(&self, prepared: &Path, method: MaterializeMethod) -> Result<(), CaptureError> {
        clear_dir(&self.config.datadir)
            .map_err(|source| CaptureError::Io { operation: op::MATERIALIZE, source })?;
        let args = self.materialize_args(prepared, method);
        self.run(op::MATERIALIZE, &self.config.binary, args).await
    }

    async fn reconcile_ownership(&self) -> Result<(), CaptureError> {
        let Some(owner) = self.config.owner.clone() else {
            tracing::info!("ownership reconciliation disabled");
            return Ok(());
        };
        let mut args = vec!["-R".to_string(), owner];
        args.extend(self.owned_dirs().iter().map(|d| d.display().to_string()));
        self.run(op::OWNERSHIP, Path::new("chown"), args).await
    }
}

/// Remove everything inside `dir`, creating it if missing.
///
/// `--copy-back` refuses a non-empty data directory.
pub(crate) fn clear_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return std::fs::create_dir_all(dir);
    }
    let mut removed = 0usize;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }
    if removed > 0 {
        tracing::warn!(datadir = %dir.display(), removed, "cleared data directory before restore");
    }
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{op, CaptureError, CaptureTool};
    use async_trait::async_trait;
    use bm_core::MaterializeMethod;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// File the fake writes into every captured tree.
    pub const MARKER_FILE: &str = "backup.marker";

    /// Recorded capture tool call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CaptureCall {
        CaptureFull { target: PathBuf },
        CaptureIncremental { target: PathBuf, base: PathBuf },
        Prepare { target: PathBuf, incrementals: Vec<PathBuf> },
        Materialize { prepared: PathBuf, method: MaterializeMethod },
        ReconcileOwnership,
    }

    #[derive(Default)]
    struct FakeCaptureState {
        calls: Vec<CaptureCall>,
        /// operation → remaining injected failures
        failures: HashMap<&'static str, u32>,
    }

    /// Fake capture tool for testing.
    ///
    /// Captures write a small marker tree so archive and upload steps have
    /// real files to work on.
    #[derive(Clone, Default)]
    pub struct FakeCaptureTool {
        inner: Arc<Mutex<FakeCaptureState>>,
    }

    impl FakeCaptureTool {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `times` calls of `operation` fail.
        pub fn fail(&self, operation: &'static str, times: u32) {
            self.inner.lock().failures.insert(operation, times);
        }

        /// Make every call of `operation` fail.
        pub fn fail_always(&self, operation: &'static str) {
            self.fail(operation, u32::MAX);
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<CaptureCall> {
            self.inner.lock().calls.clone()
        }

        fn record(&self, operation: &'static str, call: CaptureCall) -> Result<(), CaptureError> {
            let mut inner = self.inner.lock();
            inner.calls.push(call);
            match inner.failures.get_mut(operation) {
                Some(remaining) if *remaining > 0 => {
                    *remaining = remaining.saturating_sub(1);
                    Err(CaptureError::Failed {
                        operation,
                        code: Some(1),
                        stderr: "injected failure".to_string(),
                    })
                }
                _ => Ok(()),
            }
        }

        fn write_marker(target: &Path, contents: &str) -> Result<(), CaptureError> {
            let io = |source| CaptureError::Io { operation: op::CAPTURE, source };
            std::fs::create_dir_all(target).map_err(io)?;
            std::fs::write(target.join(MARKER_FILE), contents).map_err(io)
        }
    }

    #[async_trait]
    impl CaptureTool for FakeCaptureTool {
        async fn capture_full(&self, target: &Path) -> Result<(), CaptureError> {
            self.record(op::CAPTURE, CaptureCall::CaptureFull { target: target.to_path_buf() })?;
            Self::write_marker(target, "full\n")
        }

        async fn capture_incremental(&self, target: &Path, base: &Path) -> Result<(), CaptureError> {
            self.record(
                op::CAPTURE,
                CaptureCall::CaptureIncremental {
                    target: target.to_path_buf(),
                    base: base.to_path_buf(),
                },
            )?;
            let base_marker = std::fs::read_to_string(base.join(MARKER_FILE))
                .map_err(|source| CaptureError::Io { operation: op::CAPTURE, source })?;
            Self::write_marker(target, &format!("incremental on {}", base_marker))
        }

        async fn prepare(&self, target: &Path, incrementals: &[PathBuf]) -> Result<(), CaptureError> {
            self.record(
                op::PREPARE,
                CaptureCall::Prepare {
                    target: target.to_path_buf(),
                    incrementals: incrementals.to_vec(),
                },
            )
        }

        async fn materialize(&self, prepared: &Path, method: MaterializeMethod) -> Result<(), CaptureError> {
            self.record(
                op::MATERIALIZE,
                CaptureCall::Materialize { prepared: prepared.to_path_buf(), method },
            )
        }

        async fn reconcile_ownership(&self) -> Result<(), CaptureError> {
            self.record(op::OWNERSHIP, CaptureCall::ReconcileOwnership)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{CaptureCall, FakeCaptureTool, MARKER_FILE};

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
