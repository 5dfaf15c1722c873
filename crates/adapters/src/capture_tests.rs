// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use tempfile::{tempdir, TempDir};

fn config(binary: PathBuf, datadir: PathBuf) -> MariaBackupConfig {
    MariaBackupConfig {
        binary,
        host: "db.internal".to_string(),
        port: 3306,
        user: "backup".to_string(),
        password: "s3cret".to_string(),
        datadir,
        innodb_data_home_dir: None,
        innodb_log_group_home_dir: None,
        owner: None,
        timeout: Duration::from_secs(10),
    }
}

/// A stand-in binary that logs its arguments and exits with `code`.
fn script_tool(dir: &TempDir, code: i32) -> (PathBuf, PathBuf) {
    let log = dir.path().join("calls.log");
    let script = dir.path().join("mariabackup");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" >> '{}'\necho 'mariabackup: boom' >&2\nexit {}\n", log.display(), code),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}

#[test]
fn backup_args_for_full_capture() {
    let tool = MariaBackup::new(config("/usr/bin/mariabackup".into(), "/var/lib/mysql".into()));
    assert_eq!(
        tool.backup_args(Path::new("/tmp/stage/full-1"), None),
        vec![
            "--backup",
            "--target-dir=/tmp/stage/full-1",
            "--host=db.internal",
            "--port=3306",
            "--user=backup",
            "--password=s3cret",
        ]
    );
}

#[test]
fn backup_args_for_incremental_capture_name_the_base() {
    let tool = MariaBackup::new(config("/usr/bin/mariabackup".into(), "/var/lib/mysql".into()));
    let args = tool.backup_args(Path::new("/tmp/stage/inc-1"), Some(Path::new("/tmp/stage/base")));
    assert_eq!(args[1], "--target-dir=/tmp/stage/inc-1");
    assert_eq!(args[2], "--incremental-basedir=/tmp/stage/base");
}

#[yare::parameterized(
    base_only   = { None, vec!["--prepare", "--target-dir=/s/full"] },
    incremental = { Some("/s/inc"), vec!["--prepare", "--target-dir=/s/full", "--incremental-dir=/s/inc"] },
)]
fn prepare_args(incremental: Option<&str>, expected: Vec<&str>) {
    assert_eq!(MariaBackup::prepare_args(Path::new("/s/full"), incremental.map(Path::new)), expected);
}

#[yare::parameterized(
    copy = { MaterializeMethod::Copy, "--copy-back" },
    move_back = { MaterializeMethod::Move, "--move-back" },
)]
fn materialize_args(method: MaterializeMethod, flag: &str) {
    let mut cfg = config("/usr/bin/mariabackup".into(), "/var/lib/mysql".into());
    cfg.innodb_log_group_home_dir = Some("/var/log/innodb".into());
    let tool = MariaBackup::new(cfg);
    assert_eq!(
        tool.materialize_args(Path::new("/s/full"), method),
        vec![flag, "--target-dir=/s/full", "--datadir=/var/lib/mysql", "--innodb-log-group-home-dir=/var/log/innodb"]
    );
}

#[tokio::test]
async fn capture_runs_the_binary() {
    let dir = tempdir().unwrap();
    let (script, log) = script_tool(&dir, 0);
    let tool = MariaBackup::new(config(script, dir.path().join("data")));

    tool.capture_full(Path::new("/tmp/target")).await.unwrap();

    let logged = std::fs::read_to_string(log).unwrap();
    assert!(logged.starts_with("--backup --target-dir=/tmp/target"));
}

#[tokio::test]
async fn non_zero_exit_is_a_retryable_failure() {
    let dir = tempdir().unwrap();
    let (script, _) = script_tool(&dir, 2);
    let tool = MariaBackup::new(config(script, dir.path().join("data")));

    let err = tool.capture_full(Path::new("/tmp/target")).await.unwrap_err();
    match &err {
        CaptureError::Failed { operation, code, stderr } => {
            assert_eq!(*operation, op::CAPTURE);
            assert_eq!(*code, Some(2));
            assert_eq!(stderr, "mariabackup: boom");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(!err.to_string().contains("s3cret"));
}

#[tokio::test]
async fn missing_binary_is_not_retryable() {
    let dir = tempdir().unwrap();
    let tool = MariaBackup::new(config(dir.path().join("absent"), dir.path().join("data")));
    let err = tool.capture_full(Path::new("/tmp/target")).await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn cancelled_tool_does_not_run() {
    let dir = tempdir().unwrap();
    let (script, log) = script_tool(&dir, 0);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let tool = MariaBackup::new(config(script, dir.path().join("data"))).with_cancel(cancel);

    let err = tool.capture_full(Path::new("/tmp/target")).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(!err.is_retryable());
    assert!(!log.exists());
}

#[tokio::test]
async fn prepare_applies_each_incremental_in_order() {
    let dir = tempdir().unwrap();
    let (script, log) = script_tool(&dir, 0);
    let tool = MariaBackup::new(config(script, dir.path().join("data")));

    tool.prepare(Path::new("/s/full"), &[PathBuf::from("/s/i1"), PathBuf::from("/s/i2")]).await.unwrap();

    let logged = std::fs::read_to_string(log).unwrap();
    let lines: Vec<&str> = logged.lines().collect();
    assert_eq!(
        lines,
        vec![
            "--prepare --target-dir=/s/full --incremental-dir=/s/i1",
            "--prepare --target-dir=/s/full --incremental-dir=/s/i2",
        ]
    );
}

#[tokio::test]
async fn materialize_clears_the_data_directory_first() {
    let dir = tempdir().unwrap();
    let (script, _) = script_tool(&dir, 0);
    let datadir = dir.path().join("data");
    std::fs::create_dir_all(datadir.join("old_schema")).unwrap();
    std::fs::write(datadir.join("ibdata1"), b"stale").unwrap();
    let tool = MariaBackup::new(config(script, datadir.clone()));

    tool.materialize(Path::new("/s/full"), MaterializeMethod::Copy).await.unwrap();

    assert!(datadir.exists());
    assert_eq!(std::fs::read_dir(&datadir).unwrap().count(), 0);
}

#[tokio::test]
async fn ownership_is_skipped_without_owner() {
    let dir = tempdir().unwrap();
    let tool = MariaBackup::new(config(dir.path().join("absent"), dir.path().join("data")));
    tool.reconcile_ownership().await.unwrap();
}

#[test]
fn owned_dirs_are_deduplicated() {
    let mut cfg = config("/bin/true".into(), "/var/lib/mysql".into());
    cfg.innodb_data_home_dir = Some("/var/lib/mysql".into());
    cfg.innodb_log_group_home_dir = Some("/var/log/innodb".into());
    let tool = MariaBackup::new(cfg);
    assert_eq!(tool.owned_dirs(), vec![Path::new("/var/lib/mysql"), Path::new("/var/log/innodb")]);
}

#[tokio::test]
async fn fake_records_calls_and_injects_failures() {
    let dir = tempdir().unwrap();
    let fake = FakeCaptureTool::new();
    fake.fail(op::CAPTURE, 1);

    let target = dir.path().join("full");
    assert!(fake.capture_full(&target).await.is_err());
    fake.capture_full(&target).await.unwrap();

    assert_eq!(std::fs::read_to_string(target.join(MARKER_FILE)).unwrap(), "full\n");
    assert_eq!(fake.calls().len(), 2);
    assert_eq!(fake.calls()[1], CaptureCall::CaptureFull { target });
}
