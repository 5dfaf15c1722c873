// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! backupmate: full and incremental MariaDB backups in an object store

mod commands;
mod config;
mod exit_error;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::exit_error::{code, ExitError};
use crate::output::{print_json, OutputFormat};

#[derive(Parser)]
#[command(
    name = "backupmate",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")),
    about = "Full and incremental MariaDB backups in an object store"
)]
struct Cli {
    /// Env-style config file (default: $BACKUPMATE_CONFIG or .backupmate.env)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Shorthand for `--output json`
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.output
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Take a backup (full or incremental, as the schedule decides)
    Backup(commands::backup::BackupArgs),
    /// Restore the data directory from a backup chain
    Restore(commands::restore::RestoreArgs),
    /// List recorded backups
    List,
    /// Compare the catalog against the object store
    Reconcile,
}

fn main() {
    if let Err(e) = run() {
        let exit_code = e.downcast_ref::<ExitError>().map(|e| e.code).unwrap_or(code::INTERNAL);
        eprintln!("error: {:#}", e);
        std::process::exit(exit_code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "status": "failed",
                    "error_kind": "configuration",
                    "error": e.to_string(),
                }))?;
            }
            return Err(ExitError::new(code::CONFIG, e.to_string()).into());
        }
    };

    let _log_guard = logging::init(&config.log)
        .map_err(|e| ExitError::new(code::CONFIG, format!("cannot initialise logging: {:#}", e)))?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), git = env!("BUILD_GIT_HASH"), "starting");

    let command = cli.command;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancel.clone()));

        match command {
            Commands::Backup(args) => commands::backup::handle(args, &config, cancel, format).await,
            Commands::Restore(args) => commands::restore::handle(args, &config, cancel, format).await,
            Commands::List => commands::list::handle(&config, format),
            Commands::Reconcile => commands::reconcile::handle(&config, cancel, format).await,
        }
    })
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::warn!("signal received, cancelling run");
    cancel.cancel();
}
