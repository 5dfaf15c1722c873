// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bm-storage: Durable backup catalog

mod catalog;
mod log;
mod state;

pub use catalog::{Catalog, CatalogError, RunLock};
pub use log::{CatalogLog, LogEntry, LogError};
pub use state::{CatalogState, LineageError};
