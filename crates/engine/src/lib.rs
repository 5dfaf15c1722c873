// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bm-engine: Backup scheduling, chain resolution and run orchestration

mod artifact;
pub mod backup;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod restore;
pub mod retry;
pub mod scheduler;

pub use artifact::storage_location;
pub use backup::{
    close_abandoned, BackupDeps, BackupOrchestrator, BackupOutcome, BackupSettings, ABANDONED_REASON,
};
pub use error::{BackupFailure, RestoreFailure, RunError, Step};
pub use reconcile::{reconcile, MissingArtifact, ReconcileReport};
pub use resolver::{resolve_chain, ResolveError};
pub use restore::{RestoreDeps, RestoreOrchestrator, RestoreOutcome, RestoreSettings};
pub use retry::{RetryError, RetryPolicy};
pub use scheduler::{plan_backup, BackupPlan, FullReason};
