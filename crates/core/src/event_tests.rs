// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap()
}

#[test]
fn started_event_uses_tagged_format() {
    let event = CatalogEvent::BackupStarted {
        record: BackupRecord::pending_full(BackupId::new("f1"), at()),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "backup:started");
    assert_eq!(json["record"]["id"], "f1");
}

#[test]
fn succeeded_event_parses_without_checksum() {
    let json = r#"{"type":"backup:succeeded","id":"f1","storage_location":"full/f1/","finished_at":"2026-01-05T02:00:00Z"}"#;
    let event: CatalogEvent = serde_json::from_str(json).unwrap();
    assert_eq!(
        event,
        CatalogEvent::BackupSucceeded {
            id: BackupId::new("f1"),
            storage_location: "full/f1/".to_string(),
            checksum: None,
            finished_at: at(),
        }
    );
}

#[yare::parameterized(
    started   = { CatalogEvent::BackupStarted { record: BackupRecord::pending_full(BackupId::new("a"), at()) }, "backup:started" },
    succeeded = { CatalogEvent::BackupSucceeded { id: BackupId::new("a"), storage_location: "p/".into(), checksum: None, finished_at: at() }, "backup:succeeded" },
    failed    = { CatalogEvent::BackupFailed { id: BackupId::new("a"), reason: "boom".into(), finished_at: at() }, "backup:failed" },
)]
fn every_event_names_its_backup(event: CatalogEvent, name: &str) {
    assert_eq!(event.backup_id(), "a");
    assert_eq!(event.name(), name);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], name);
}
