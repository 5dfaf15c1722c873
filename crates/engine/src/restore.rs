// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore orchestration: resolve, download, prepare, materialize.
//!
//! There is no rollback. A failure leaves the staging directory in place and
//! reports how far the chain got.

use crate::artifact::{blocking, fetch_artifact, remove_dir, reset_dir};
use crate::error::{RestoreFailure, RunError, Step};
use crate::resolver::resolve_chain;
use crate::retry::RetryPolicy;
use bm_adapters::{decompress, CaptureTool, ObjectStoreGateway, ServerControl, ServerError};
use bm_core::{BackupId, BackupRecord, MaterializeMethod, RestoreRequest};
use bm_storage::Catalog;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub bucket: String,
    pub staging_root: PathBuf,
    pub stop_server: bool,
    pub start_server: bool,
}

pub struct RestoreDeps<T, S, V> {
    pub capture: T,
    pub store: S,
    pub server: V,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub chain: Vec<BackupId>,
    pub applied_incrementals: usize,
    pub method: MaterializeMethod,
}

fn at<E: Into<RunError>>(step: Step) -> impl FnOnce(E) -> (Step, RunError) {
    move |e| (step, e.into())
}

pub struct RestoreOrchestrator<T, S, V> {
    catalog: Catalog,
    capture: T,
    store: S,
    server: V,
    settings: RestoreSettings,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<T, S, V> RestoreOrchestrator<T, S, V>
where
    T: CaptureTool,
    S: ObjectStoreGateway,
    V: ServerControl,
{
    pub fn new(
        catalog: Catalog,
        deps: RestoreDeps<T, S, V>,
        settings: RestoreSettings,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            capture: deps.capture,
            store: deps.store,
            server: deps.server,
            settings,
            retry,
            cancel,
        }
    }

    pub async fn run(
        &self,
        request: &RestoreRequest,
        method: MaterializeMethod,
    ) -> Result<RestoreOutcome, RestoreFailure> {
        let started = Instant::now();
        let early = |step: Step, error: RunError| RestoreFailure {
            step,
            chain: Vec::new(),
            applied_incrementals: 0,
            staging: None,
            error,
        };

        let _run_lock = self.catalog.run_lock().map_err(|e| early(Step::Lock, e.into()))?;
        let state = self.catalog.state().map_err(|e| early(Step::Resolve, e.into()))?;
        let chain = resolve_chain(&state, request).map_err(|e| early(Step::Resolve, e.into()))?;
        let ids: Vec<BackupId> = chain.iter().map(|r| r.id.clone()).collect();
        info!(%request, chain = ?ids, %method, "restore chain resolved");

        let target = ids.last().map(|id| id.as_str()).unwrap_or("chain");
        let staging = self.settings.staging_root.join(format!("restore-{}", target));
        let mut applied = 0;
        let result = self.execute(&chain, &staging, method, &mut applied).await;

        match result {
            Ok(()) => {
                if let Err(e) = remove_dir(&staging) {
                    warn!(staging = %staging.display(), error = %e, "failed to remove staging directory");
                }
                info!(
                    chain = ?ids,
                    applied_incrementals = applied,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "restore succeeded"
                );
                Ok(RestoreOutcome { chain: ids, applied_incrementals: applied, method })
            }
            Err((step, error)) => {
                error!(
                    %step,
                    chain = ?ids,
                    applied_incrementals = applied,
                    staging = %staging.display(),
                    error = %error,
                    "restore failed, staging kept"
                );
                Err(RestoreFailure {
                    step,
                    chain: ids,
                    applied_incrementals: applied,
                    staging: Some(staging),
                    error,
                })
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
        chain: &[BackupRecord],
        staging: &Path,
        method: MaterializeMethod,
        applied: &mut usize,
    ) -> Result<(), (Step, RunError)> {
        reset_dir(staging).map_err(at(Step::Download))?;

        let mut trees = Vec::with_capacity(chain.len());
        for record in chain {
            self.checkpoint().map_err(at(Step::Download))?;
            let archive = fetch_artifact(
                &self.store,
                &self.retry,
                &self.cancel,
                &self.settings.bucket,
                record,
                &staging.join("download").join(record.id.as_str()),
            )
            .await
            .map_err(at(Step::Download))?;
            let dest = staging.join("extract").join(record.id.as_str());
            let tree = blocking(move || Ok(decompress(&archive, &dest)?))
                .await
                .map_err(at(Step::Decompress))?;
            trees.push(tree);
        }
        let Some((full, incrementals)) = trees.split_first() else {
            return Ok(());
        };

        self.checkpoint().map_err(at(Step::Prepare))?;
        self.capture
            .prepare(full, &[])
            .await
            .map_err(|e| (Step::Prepare, RunError::tool(e, RunError::Prepare)))?;
        for incremental in incrementals {
            self.checkpoint().map_err(at(Step::Prepare))?;
            self.capture
                .prepare(full, std::slice::from_ref(incremental))
                .await
                .map_err(|e| (Step::Prepare, RunError::tool(e, RunError::Prepare)))?;
            *applied += 1;
            info!(incremental = %incremental.display(), applied = *applied, "incremental applied");
        }

        if self.settings.stop_server {
            self.checkpoint().map_err(at(Step::StopServer))?;
            let server = &self.server;
            self.retry
                .run("stop server", &self.cancel, ServerError::is_retryable, move || server.stop())
                .await
                .map_err(at(Step::StopServer))?;
        }

        self.checkpoint().map_err(at(Step::Materialize))?;
        self.capture
            .materialize(full, method)
            .await
            .map_err(|e| (Step::Materialize, RunError::tool(e, RunError::Materialize)))?;
        self.capture
            .reconcile_ownership()
            .await
            .map_err(|e| (Step::Ownership, RunError::tool(e, RunError::Materialize)))?;

        if self.settings.start_server {
            let server = &self.server;
            self.retry
                .run("start server", &self.cancel, ServerError::is_retryable, move || server.start())
                .await
                .map_err(at(Step::StartServer))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
