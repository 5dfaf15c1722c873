// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bm-core: Core types for the backupmate backup chain manager

pub mod backup;
pub mod clock;
pub mod event;
pub mod id;
pub mod restore;
pub mod schedule;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backup::{BackupKind, BackupRecord, BackupStatus};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::CatalogEvent;
pub use id::{short, BackupId};
pub use restore::{MaterializeMethod, RestoreRequest};
pub use schedule::{Cadence, CadenceParseError};
