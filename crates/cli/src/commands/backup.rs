// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup command handler

use anyhow::Result;
use bm_adapters::{MariaBackup, ObjectStoreBackend};
use bm_core::{BackupId, BackupKind, SystemClock};
use bm_engine::{BackupDeps, BackupFailure, BackupOrchestrator, BackupOutcome, Step};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::open_catalog;
use crate::config::Config;
use crate::exit_error::{exit_code, ExitError};
use crate::output::{format_timestamp, print_json, OutputFormat};

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Take a full backup even if the current chain is not due for one
    #[arg(long)]
    pub full: bool,
}

#[derive(Serialize)]
struct Succeeded<'a> {
    status: &'static str,
    #[serde(flatten)]
    outcome: &'a BackupOutcome,
}

#[derive(Serialize)]
struct Failed<'a> {
    status: &'static str,
    step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup_id: Option<&'a BackupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<BackupKind>,
    error_kind: &'static str,
    error: String,
}

pub async fn handle(
    args: BackupArgs,
    config: &Config,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    let catalog = open_catalog(config)?;
    let deps = BackupDeps {
        capture: MariaBackup::new(config.capture_config()).with_cancel(cancel.clone()),
        store: ObjectStoreBackend::new(config.store.clone()),
    };
    let orchestrator = BackupOrchestrator::new(
        catalog,
        deps,
        SystemClock,
        config.backup_settings(),
        config.retry.clone(),
        cancel,
    );

    match orchestrator.run(args.full).await {
        Ok(outcome) => {
            match format {
                OutputFormat::Json => print_json(&Succeeded { status: "succeeded", outcome: &outcome })?,
                OutputFormat::Text => print_outcome(&outcome),
            }
            Ok(())
        }
        Err(failure) => {
            if format == OutputFormat::Json {
                print_json(&failure_report(&failure))?;
            }
            Err(ExitError::new(exit_code(&failure.error), failure.to_string()).into())
        }
    }
}

fn failure_report(failure: &BackupFailure) -> Failed<'_> {
    Failed {
        status: "failed",
        step: failure.step,
        backup_id: failure.backup_id.as_ref(),
        kind: failure.kind,
        error_kind: failure.error.kind(),
        error: failure.error.to_string(),
    }
}

fn print_outcome(outcome: &BackupOutcome) {
    for id in &outcome.abandoned {
        println!("Closed abandoned backup {}", id);
    }
    match (&outcome.parent_id, outcome.full_reason) {
        (Some(parent), _) => println!("Incremental backup {} (parent {})", outcome.backup_id, parent),
        (None, Some(reason)) => println!("Full backup {} ({})", outcome.backup_id, reason),
        (None, None) => println!("Full backup {}", outcome.backup_id),
    }
    println!("  created:  {}", format_timestamp(outcome.created_at));
    println!("  location: {}", outcome.storage_location);
    println!("  size:     {} bytes", outcome.size_bytes);
    println!("  sha256:   {}", outcome.checksum);
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
