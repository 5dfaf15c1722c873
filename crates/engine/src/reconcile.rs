// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only comparison of the catalog against the object store.

use crate::error::RunError;
use crate::retry::RetryPolicy;
use bm_adapters::{ObjectStoreGateway, TransferError};
use bm_core::BackupId;
use bm_storage::CatalogState;
use serde::Serialize;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingArtifact {
    pub backup_id: BackupId,
    pub storage_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Succeeded records checked.
    pub checked: usize,
    /// Succeeded records with nothing stored at their location.
    pub missing: Vec<MissingArtifact>,
    /// Keys under the backup prefixes that no succeeded record owns, e.g.
    /// partial uploads of failed runs.
    pub orphaned_keys: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphaned_keys.is_empty()
    }
}

/// List every prefix and compare against the succeeded records in `state`.
pub async fn reconcile<S: ObjectStoreGateway>(
    state: &CatalogState,
    store: &S,
    bucket: &str,
    prefixes: &[&str],
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ReconcileReport, RunError> {
    let mut keys = BTreeSet::new();
    let distinct: BTreeSet<&str> = prefixes.iter().copied().collect();
    for prefix in distinct {
        let listed = retry
            .run("list", cancel, TransferError::is_retryable, move || store.list_keys(bucket, prefix))
            .await?;
        keys.extend(listed);
    }

    let locations: Vec<(&BackupId, &str)> = state
        .list()
        .into_iter()
        .filter(|r| r.is_succeeded())
        .filter_map(|r| r.storage_location.as_deref().map(|loc| (&r.id, loc)))
        .collect();

    let missing = locations
        .iter()
        .filter(|(_, loc)| !keys.iter().any(|k| k.starts_with(loc)))
        .map(|(id, loc)| MissingArtifact { backup_id: (*id).clone(), storage_location: loc.to_string() })
        .collect();
    let orphaned_keys = keys
        .into_iter()
        .filter(|k| !locations.iter().any(|(_, loc)| k.starts_with(loc)))
        .collect();

    let report = ReconcileReport { checked: locations.len(), missing, orphaned_keys };
    tracing::info!(
        checked = report.checked,
        missing = report.missing.len(),
        orphaned = report.orphaned_keys.len(),
        "reconcile finished"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
