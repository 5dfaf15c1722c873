// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bm_core::test_support::day;
use tempfile::tempdir;

fn full(id: &str, n: i64) -> BackupRecord {
    BackupRecord::pending_full(BackupId::new(id), day(n))
}

fn incremental(id: &str, parent: &str, n: i64) -> BackupRecord {
    BackupRecord::pending_incremental(BackupId::new(id), BackupId::new(parent), day(n))
}

fn succeed(catalog: &Catalog, id: &str) -> BackupRecord {
    catalog.succeed(&BackupId::new(id), &format!("full/{id}/"), Some("abc123"), day(30)).unwrap()
}

#[test]
fn begin_then_succeed_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();

    catalog.begin(&full("f1", 0)).unwrap();
    assert_eq!(catalog.get("f1").unwrap().unwrap().status, BackupStatus::Pending);

    let record = succeed(&catalog, "f1");
    assert_eq!(record.status, BackupStatus::Succeeded);
    assert_eq!(record.checksum.as_deref(), Some("abc123"));

    // A fresh handle sees the same history
    let reopened = Catalog::open(dir.path()).unwrap();
    let latest = reopened.latest_succeeded(BackupKind::Full).unwrap().unwrap();
    assert_eq!(latest.id, "f1");
    assert_eq!(latest.storage_location.as_deref(), Some("full/f1/"));
}

#[test]
fn begin_is_refused_while_a_record_is_pending() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();

    let err = catalog.begin(&full("f2", 1)).unwrap_err();
    assert!(matches!(err, CatalogError::PendingExists(ref id) if id == "f1"));
    assert!(err.is_concurrency());

    let pending: Vec<_> = catalog.state().unwrap().pending().into_iter().cloned().collect();
    assert_eq!(pending.len(), 1);
    assert!(catalog.get("f2").unwrap().is_none());
}

#[test]
fn a_second_handle_sees_the_pending_record() {
    let dir = tempdir().unwrap();
    let first = Catalog::open(dir.path()).unwrap();
    let second = Catalog::open(dir.path()).unwrap();

    first.begin(&full("f1", 0)).unwrap();
    assert!(matches!(second.begin(&full("f2", 1)), Err(CatalogError::PendingExists(_))));
}

#[test]
fn failed_record_frees_the_line() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();

    let record = catalog.fail(&BackupId::new("f1"), "upload failed", day(0)).unwrap();
    assert_eq!(record.status, BackupStatus::Failed);
    assert_eq!(record.failure.as_deref(), Some("upload failed"));

    catalog.begin(&full("f2", 1)).unwrap();
}

#[test]
fn closed_records_cannot_change() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();
    succeed(&catalog, "f1");

    let err = catalog.fail(&BackupId::new("f1"), "late", day(1)).unwrap_err();
    assert!(matches!(err, CatalogError::AlreadyClosed { status: BackupStatus::Succeeded, .. }));
    assert!(matches!(
        catalog.succeed(&BackupId::new("nope"), "x/", None, day(1)),
        Err(CatalogError::UnknownBackup(_))
    ));
}

#[test]
fn duplicate_id_is_rejected() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();
    succeed(&catalog, "f1");

    assert!(matches!(catalog.begin(&full("f1", 2)), Err(CatalogError::DuplicateId(_))));
}

#[test]
fn incremental_parent_must_be_succeeded() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();

    let err = catalog.begin(&incremental("i1", "missing", 1)).unwrap_err();
    assert!(matches!(err, CatalogError::UnusableParent { .. }));

    catalog.begin(&full("f1", 0)).unwrap();
    catalog.fail(&BackupId::new("f1"), "capture failed", day(0)).unwrap();
    let err = catalog.begin(&incremental("i1", "f1", 1)).unwrap_err();
    assert!(matches!(err, CatalogError::UnusableParent { ref reason, .. } if reason.contains("failed")));

    catalog.begin(&full("f2", 2)).unwrap();
    succeed(&catalog, "f2");
    catalog.begin(&incremental("i2", "f2", 3)).unwrap();
}

#[yare::parameterized(
    same_instant = { 1 },
    earlier      = { 0 },
)]
fn created_at_must_follow_every_existing_record(n: i64) {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();
    succeed(&catalog, "f1");
    catalog.begin(&incremental("i1", "f1", 1)).unwrap();
    succeed(&catalog, "i1");

    let err = catalog.begin(&incremental("i2", "f1", n)).unwrap_err();
    assert!(matches!(err, CatalogError::OutOfOrder { ref id, latest, .. } if id == "i2" && latest == day(1)));
    assert!(catalog.get("i2").unwrap().is_none());

    // Nothing sneaks into the chain cut at i1
    let chain: Vec<String> =
        catalog.chain_after("f1").unwrap().into_iter().map(|r| r.id.to_string()).collect();
    assert_eq!(chain, vec!["i1"]);

    catalog.begin(&incremental("i2", "f1", 2)).unwrap();
}

#[test]
fn failed_records_still_bound_created_at() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 3)).unwrap();
    catalog.fail(&BackupId::new("f1"), "capture failed", day(3)).unwrap();

    assert!(matches!(catalog.begin(&full("f2", 3)), Err(CatalogError::OutOfOrder { .. })));
    catalog.begin(&full("f2", 4)).unwrap();
}

#[yare::parameterized(
    full_with_parent = { {
        let mut r = full("f1", 0);
        r.parent_id = Some(BackupId::new("x"));
        r
    } },
    incremental_without_parent = { {
        let mut r = incremental("i1", "x", 0);
        r.parent_id = None;
        r
    } },
    not_pending = { {
        let mut r = full("f1", 0);
        r.status = BackupStatus::Succeeded;
        r
    } },
)]
fn malformed_records_are_rejected(record: BackupRecord) {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    assert!(matches!(catalog.begin(&record), Err(CatalogError::InvalidRecord { .. })));
    assert!(catalog.list().unwrap().is_empty());
}

#[test]
fn run_lock_is_exclusive_until_dropped() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();

    let guard = catalog.run_lock().unwrap();
    let err = catalog.run_lock().unwrap_err();
    assert!(matches!(err, CatalogError::RunLocked(_)));
    assert!(err.is_concurrency());

    let pid = std::fs::read_to_string(dir.path().join("run.lock")).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    drop(guard);
    catalog.run_lock().unwrap();
}

#[test]
fn chain_after_lists_the_full_lines_incrementals() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    catalog.begin(&full("f1", 0)).unwrap();
    succeed(&catalog, "f1");
    for (id, n) in [("i1", 1), ("i2", 2)] {
        catalog.begin(&incremental(id, "f1", n)).unwrap();
        succeed(&catalog, id);
    }

    let chain: Vec<String> =
        catalog.chain_after("f1").unwrap().into_iter().map(|r| r.id.to_string()).collect();
    assert_eq!(chain, vec!["i1", "i2"]);
}

#[test]
fn open_reports_corrupt_catalog() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("catalog.jsonl"), b"garbage\n{\"also\": \"bad\"}\n").unwrap();
    assert!(matches!(Catalog::open(dir.path()), Err(CatalogError::Log(LogError::Corrupt { .. }))));
}
