// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bm_core::test_support::strategies::arb_history;
use bm_core::test_support::{
    day, failed, full_ok, full_started, incremental_ok, incremental_started, succeeded,
};
use proptest::prelude::*;

fn state(events: Vec<Vec<CatalogEvent>>) -> CatalogState {
    let events: Vec<CatalogEvent> = events.into_iter().flatten().collect();
    CatalogState::from_events(&events)
}

fn ids(records: Vec<&BackupRecord>) -> Vec<&str> {
    records.into_iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn started_creates_pending_record() {
    let s = state(vec![vec![full_started("f1", day(0))]]);
    let record = s.get("f1").unwrap();
    assert_eq!(record.status, BackupStatus::Pending);
    assert!(record.storage_location.is_none());
    assert_eq!(ids(s.pending()), vec!["f1"]);
}

#[test]
fn succeeded_sets_location_and_closes_record() {
    let s = state(vec![full_ok("f1", 0)]);
    let record = s.get("f1").unwrap();
    assert_eq!(record.status, BackupStatus::Succeeded);
    assert_eq!(record.storage_location.as_deref(), Some("backups/f1/"));
    assert!(record.finished_at.is_some());
    assert!(s.pending().is_empty());
}

#[test]
fn first_terminal_event_wins() {
    let s = state(vec![vec![
        full_started("f1", day(0)),
        failed("f1", day(0)),
        succeeded("f1", day(0)),
    ]]);
    let record = s.get("f1").unwrap();
    assert_eq!(record.status, BackupStatus::Failed);
    assert!(record.storage_location.is_none());
    assert_eq!(record.failure.as_deref(), Some("capture failed"));
}

#[test]
fn repeated_start_is_ignored() {
    let s = state(vec![full_ok("f1", 0), vec![full_started("f1", day(3))]]);
    assert_eq!(s.len(), 1);
    assert_eq!(s.get("f1").unwrap().created_at, day(0));
}

#[test]
fn terminal_event_for_unknown_id_is_ignored() {
    let s = state(vec![vec![succeeded("ghost", day(0))]]);
    assert!(s.is_empty());
}

#[test]
fn list_orders_by_created_at() {
    let s = state(vec![full_ok("late", 5), full_ok("early", 1), full_ok("mid", 3)]);
    assert_eq!(ids(s.list()), vec!["early", "mid", "late"]);
}

#[test]
fn latest_succeeded_skips_failed_and_pending() {
    let s = state(vec![
        full_ok("f1", 0),
        vec![full_started("f2", day(7)), failed("f2", day(7))],
        vec![full_started("f3", day(8))],
    ]);
    assert_eq!(s.latest_succeeded(BackupKind::Full).unwrap().id, "f1");
    assert_eq!(s.latest_of_kind(BackupKind::Full).unwrap().id, "f3");
    assert!(s.latest_succeeded(BackupKind::Incremental).is_none());
}

#[test]
fn chain_after_returns_succeeded_incrementals_of_that_full() {
    let s = state(vec![
        full_ok("f1", 0),
        incremental_ok("i1", "f1", 1),
        vec![incremental_started("i2", "f1", day(2)), failed("i2", day(2))],
        incremental_ok("i3", "f1", 3),
        full_ok("f2", 7),
        incremental_ok("i4", "f2", 8),
    ]);
    assert_eq!(ids(s.chain_after("f1")), vec!["i1", "i3"]);
    assert_eq!(ids(s.chain_after("f2")), vec!["i4"]);
    assert!(s.chain_after("i1").is_empty());
}

#[test]
fn chain_after_follows_multi_level_lineage() {
    let s = state(vec![
        full_ok("f1", 0),
        incremental_ok("i1", "f1", 1),
        incremental_ok("i2", "i1", 2),
    ]);
    assert_eq!(ids(s.chain_after("f1")), vec!["i1", "i2"]);
}

#[test]
fn lineage_root_reports_missing_parent() {
    let s = state(vec![incremental_ok("i1", "gone", 1)]);
    assert_eq!(s.lineage_root("i1"), Err(LineageError::Missing(BackupId::new("gone"))));
}

#[test]
fn lineage_root_reports_failed_ancestor() {
    let s = state(vec![
        vec![full_started("f1", day(0)), failed("f1", day(0))],
        incremental_ok("i1", "f1", 1),
    ]);
    assert!(matches!(
        s.lineage_root("i1"),
        Err(LineageError::NotSucceeded { ref id, status: BackupStatus::Failed }) if id == "f1"
    ));
}

#[test]
fn lineage_root_detects_cycles() {
    let s = state(vec![incremental_ok("a", "b", 1), incremental_ok("b", "a", 2)]);
    assert!(matches!(s.lineage_root("a"), Err(LineageError::Cycle(_))));
    assert!(s.chain_after("a").is_empty());
}

#[yare::parameterized(
    empty_catalog = { vec![] },
    clock_ahead   = { full_ok("f1", 5) },
)]
fn next_created_at_uses_clock_when_ahead(events: Vec<CatalogEvent>) {
    let s = CatalogState::from_events(&events);
    assert_eq!(s.next_created_at(day(10)), day(10));
}

#[test]
fn next_created_at_stays_ahead_of_a_lagging_clock() {
    let s = state(vec![full_ok("f1", 5)]);
    let at = s.next_created_at(day(2));
    assert!(at > day(5));
    assert_eq!(s.next_created_at(day(5)), at);
}

proptest! {
    #[test]
    fn every_succeeded_incremental_resolves_to_a_succeeded_full(events in arb_history()) {
        let s = CatalogState::from_events(&events);
        for record in s.list() {
            if record.kind == BackupKind::Incremental && record.is_succeeded() {
                let root = s.lineage_root(&record.id).unwrap();
                prop_assert_eq!(root.kind, BackupKind::Full);
                prop_assert!(root.is_succeeded());
                prop_assert!(root.created_at < record.created_at);
            }
        }
    }

    #[test]
    fn chain_after_is_strictly_ascending(events in arb_history()) {
        let s = CatalogState::from_events(&events);
        for full in s.list().into_iter().filter(|r| r.kind == BackupKind::Full) {
            let chain = s.chain_after(&full.id);
            for pair in chain.windows(2) {
                prop_assert!(pair[0].created_at < pair[1].created_at);
            }
        }
    }
}
