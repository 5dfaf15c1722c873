// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{BackupId, BackupRecord, CatalogEvent};

/// Midnight UTC on 2026-01-01 plus `n` days.
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        + Duration::days(n)
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn full_started(id: &str, at: DateTime<Utc>) -> CatalogEvent {
    CatalogEvent::BackupStarted { record: BackupRecord::pending_full(BackupId::new(id), at) }
}

pub fn incremental_started(id: &str, parent: &str, at: DateTime<Utc>) -> CatalogEvent {
    CatalogEvent::BackupStarted {
        record: BackupRecord::pending_incremental(BackupId::new(id), BackupId::new(parent), at),
    }
}

pub fn succeeded(id: &str, at: DateTime<Utc>) -> CatalogEvent {
    CatalogEvent::BackupSucceeded {
        id: BackupId::new(id),
        storage_location: format!("backups/{}/", id),
        checksum: None,
        finished_at: at,
    }
}

pub fn failed(id: &str, at: DateTime<Utc>) -> CatalogEvent {
    CatalogEvent::BackupFailed {
        id: BackupId::new(id),
        reason: "capture failed".to_string(),
        finished_at: at,
    }
}

/// A succeeded full backup taken on `day(n)`.
pub fn full_ok(id: &str, n: i64) -> Vec<CatalogEvent> {
    vec![full_started(id, day(n)), succeeded(id, day(n) + Duration::minutes(5))]
}

/// A succeeded incremental backup taken on `day(n)`.
pub fn incremental_ok(id: &str, parent: &str, n: i64) -> Vec<CatalogEvent> {
    vec![incremental_started(id, parent, day(n)), succeeded(id, day(n) + Duration::minutes(5))]
}

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for catalog histories.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// One simulated backup attempt: (is_full, succeeded, hours since previous).
    fn arb_attempt() -> impl Strategy<Value = (bool, bool, i64)> {
        (any::<bool>(), prop::bool::weighted(0.8), 1i64..200)
    }

    /// A well-formed history: attempts in ascending time, each incremental
    /// chained to the latest succeeded full (attempts with no such full
    /// become fulls), every attempt closed.
    pub fn arb_history() -> impl Strategy<Value = Vec<CatalogEvent>> {
        prop::collection::vec(arb_attempt(), 0..24).prop_map(|attempts| {
            let mut events = Vec::new();
            let mut at = day(0);
            let mut latest_full: Option<String> = None;
            for (n, (is_full, ok, gap)) in attempts.into_iter().enumerate() {
                at += Duration::hours(gap);
                let id = format!("b{:02}", n);
                match (is_full, &latest_full) {
                    (false, Some(parent)) => events.push(incremental_started(&id, parent, at)),
                    _ => events.push(full_started(&id, at)),
                }
                let became_full = is_full || latest_full.is_none();
                if ok {
                    events.push(succeeded(&id, at + Duration::minutes(1)));
                    if became_full {
                        latest_full = Some(id);
                    }
                } else {
                    events.push(failed(&id, at + Duration::minutes(1)));
                }
            }
            events
        })
    }
}
