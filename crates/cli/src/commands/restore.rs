// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore command handler

use anyhow::Result;
use bm_adapters::{MariaBackup, ObjectStoreBackend, SystemServer};
use bm_core::{BackupId, MaterializeMethod, RestoreRequest};
use bm_engine::{RestoreDeps, RestoreFailure, RestoreOrchestrator, RestoreOutcome, Step};
use clap::{ArgGroup, Args};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::open_catalog;
use crate::config::Config;
use crate::exit_error::{exit_code, ExitError};
use crate::output::{print_json, OutputFormat};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["id", "latest_full", "latest_incremental"])))]
pub struct RestoreArgs {
    /// Backup ID to restore to (full or incremental)
    pub id: Option<String>,
    /// Restore the most recent successful full backup
    #[arg(long)]
    pub latest_full: bool,
    /// Restore the most recent successful incremental with its full
    #[arg(long)]
    pub latest_incremental: bool,
    /// Copy prepared files into the data directory (default)
    #[arg(long, conflicts_with = "move_back")]
    pub copy_back: bool,
    /// Move prepared files into the data directory
    #[arg(long)]
    pub move_back: bool,
    /// Leave the database server running before materializing
    #[arg(long)]
    pub no_stop_server: bool,
    /// Do not start the database server afterwards
    #[arg(long)]
    pub no_start_server: bool,
}

impl RestoreArgs {
    pub fn request(&self) -> RestoreRequest {
        match &self.id {
            Some(id) => RestoreRequest::ById(BackupId::new(id.as_str())),
            None if self.latest_full => RestoreRequest::LatestFull,
            None => RestoreRequest::LatestIncremental,
        }
    }

    pub fn method(&self) -> MaterializeMethod {
        if self.move_back {
            MaterializeMethod::Move
        } else {
            MaterializeMethod::Copy
        }
    }
}

#[derive(Serialize)]
struct Succeeded<'a> {
    status: &'static str,
    #[serde(flatten)]
    outcome: &'a RestoreOutcome,
}

#[derive(Serialize)]
struct Failed<'a> {
    status: &'static str,
    step: Step,
    chain: &'a [BackupId],
    applied_incrementals: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    staging: Option<&'a Path>,
    error_kind: &'static str,
    error: String,
}

pub async fn handle(
    args: RestoreArgs,
    config: &Config,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    let catalog = open_catalog(config)?;
    let deps = RestoreDeps {
        capture: MariaBackup::new(config.capture_config()).with_cancel(cancel.clone()),
        store: ObjectStoreBackend::new(config.store.clone()),
        server: SystemServer::new(config.server.clone(), cancel.clone()),
    };
    let settings = config.restore_settings(!args.no_stop_server, !args.no_start_server);
    let orchestrator = RestoreOrchestrator::new(catalog, deps, settings, config.retry.clone(), cancel);

    match orchestrator.run(&args.request(), args.method()).await {
        Ok(outcome) => {
            match format {
                OutputFormat::Json => print_json(&Succeeded { status: "succeeded", outcome: &outcome })?,
                OutputFormat::Text => print_outcome(&outcome, &config.datadir),
            }
            Ok(())
        }
        Err(failure) => {
            if format == OutputFormat::Json {
                print_json(&failure_report(&failure))?;
            }
            Err(ExitError::new(exit_code(&failure.error), failure_message(&failure)).into())
        }
    }
}

/// Text form of a failed restore: step, chain progress, then where staging was kept.
fn failure_message(failure: &RestoreFailure) -> String {
    match &failure.staging {
        Some(staging) => format!("{}\nstaging kept at {}", failure, staging.display()),
        None => failure.to_string(),
    }
}

fn failure_report(failure: &RestoreFailure) -> Failed<'_> {
    Failed {
        status: "failed",
        step: failure.step,
        chain: &failure.chain,
        applied_incrementals: failure.applied_incrementals,
        staging: failure.staging.as_deref(),
        error_kind: failure.error.kind(),
        error: failure.error.to_string(),
    }
}

fn print_outcome(outcome: &RestoreOutcome, datadir: &Path) {
    let chain: Vec<&str> = outcome.chain.iter().map(|id| id.as_str()).collect();
    println!("Restored {} into {}", chain.join(" -> "), datadir.display());
    println!(
        "  {} incremental(s) applied, files {}",
        outcome.applied_incrementals,
        match outcome.method {
            MaterializeMethod::Copy => "copied",
            MaterializeMethod::Move => "moved",
        }
    );
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
