// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bm-adapters: External I/O behind traits
//!
//! Each capability the orchestrators consume has a trait, a production
//! implementation, and a `Fake*` implementation (behind `test-support`) that
//! records calls and can inject failures.

pub mod archive;
pub mod capture;
pub mod server;
pub mod store;
pub mod subprocess;

pub use archive::{compress_dir, decompress, sha256_file, ArchiveError, ArchiveFormat};
pub use capture::{CaptureError, CaptureTool, MariaBackup, MariaBackupConfig};
pub use server::{ServerControl, ServerError, ServerLifecycle, SystemServer};
pub use store::{join_key, ObjectStoreBackend, ObjectStoreGateway, StoreConfig, TransferError};
pub use subprocess::SubprocessError;

#[cfg(any(test, feature = "test-support"))]
pub use capture::{CaptureCall, FakeCaptureTool, MARKER_FILE};
#[cfg(any(test, feature = "test-support"))]
pub use server::{FakeServer, ServerCall};
#[cfg(any(test, feature = "test-support"))]
pub use store::{FakeObjectStore, StoreCall};
