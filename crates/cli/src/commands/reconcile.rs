// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconcile command handler

use anyhow::Result;
use bm_adapters::ObjectStoreBackend;
use bm_engine::ReconcileReport;
use tokio_util::sync::CancellationToken;

use super::open_catalog;
use crate::config::Config;
use crate::exit_error::{code, exit_code, ExitError};
use crate::output::{print_json, OutputFormat};

pub async fn handle(config: &Config, cancel: CancellationToken, format: OutputFormat) -> Result<()> {
    let catalog = open_catalog(config)?;
    let state = catalog.state()?;
    let store = ObjectStoreBackend::new(config.store.clone());
    let prefixes = [config.full_prefix.as_str(), config.incremental_prefix.as_str()];

    let report = bm_engine::reconcile(&state, &store, &config.bucket, &prefixes, &config.retry, &cancel)
        .await
        .map_err(|e| ExitError::new(exit_code(&e), format!("reconcile failed: {}", e)))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print!("{}", render(&report)),
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(ExitError::new(
            code::INTERNAL,
            format!(
                "{} missing artifact(s), {} orphaned key(s)",
                report.missing.len(),
                report.orphaned_keys.len()
            ),
        )
        .into())
    }
}

pub(crate) fn render(report: &ReconcileReport) -> String {
    let mut out = format!("Checked {} succeeded backup(s)\n", report.checked);
    if report.is_clean() {
        out.push_str("Catalog and object store agree\n");
        return out;
    }
    for missing in &report.missing {
        out.push_str(&format!("missing   {}  {}\n", missing.backup_id, missing.storage_location));
    }
    for key in &report.orphaned_keys {
        out.push_str(&format!("orphaned  {}\n", key));
    }
    out
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
