// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use std::collections::HashMap;

#[test]
fn backup_id_hash_map_lookup() {
    let mut map = HashMap::new();
    map.insert(BackupId::new("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
}

#[test]
fn backup_id_short_truncates() {
    let id = BackupId::new("full-20260105T020000Z-abcdef");
    assert_eq!(id.short(4), "full");
}

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

#[test]
fn generated_id_carries_kind_and_timestamp() {
    let at = Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap();
    let id = BackupId::generate(BackupKind::Full, at);
    assert!(id.starts_with("full-20260105T020000Z-"), "{id}");
    assert_eq!(id.len(), "full-20260105T020000Z-".len() + 6);

    let inc = BackupId::generate(BackupKind::Incremental, at);
    assert!(inc.starts_with("inc-20260105T020000Z-"), "{inc}");
}

#[test]
fn generated_ids_are_unique_within_one_second() {
    let at = Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap();
    let a = BackupId::generate(BackupKind::Full, at);
    let b = BackupId::generate(BackupKind::Full, at);
    assert_ne!(a, b);
}

#[test]
fn backup_id_serializes_transparently() {
    let id = BackupId::new("inc-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"inc-1\"");
    let back: BackupId = serde_json::from_str("\"inc-1\"").unwrap();
    assert_eq!(back, "inc-1");
}
