// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bm_core::{BackupId, BackupStatus};
use chrono::{TimeZone, Utc};

#[test]
fn renders_one_row_per_record_with_parent_column() {
    let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let full = BackupRecord::pending_full(BackupId::new("full-1"), created);
    let mut inc = BackupRecord::pending_incremental(
        BackupId::new("inc-1"),
        BackupId::new("full-1"),
        created + chrono::Duration::days(1),
    );
    inc.status = BackupStatus::Failed;

    let rendered = render(&[full, inc]);
    let lines: Vec<Vec<&str>> = rendered.lines().map(|l| l.split_whitespace().collect()).collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], vec!["ID", "KIND", "CREATED", "STATUS", "PARENT"]);
    assert_eq!(lines[1], vec!["full-1", "full", "2026-01-01", "00:00:00", "pending", "-"]);
    assert_eq!(lines[2], vec!["inc-1", "incremental", "2026-01-02", "00:00:00", "failed", "full-1"]);
}
