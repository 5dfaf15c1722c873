// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use tempfile::tempdir;

fn valid() -> HashMap<String, String> {
    [
        ("DB_HOST", "db.internal"),
        ("DB_PORT", "3306"),
        ("DB_USER", "backup"),
        ("DB_PASSWORD", "hunter2"),
        ("MARIADB_BACKUP_PATH", "/usr/bin/mariabackup"),
        ("S3_BUCKET_NAME", "backups"),
        ("AWS_ACCESS_KEY_ID", "AKIA"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
        ("AWS_REGION", "eu-west-1"),
        ("LOCAL_TEMP_DIR", "/var/tmp/backupmate"),
        ("FULL_BACKUP_PREFIX", "full/"),
        ("INCREMENTAL_BACKUP_PREFIX", "incremental/"),
        ("FULL_BACKUP_SCHEDULE", "weekly"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn load(map: &HashMap<String, String>) -> Result<Config, ConfigError> {
    Config::from_lookup(|key| map.get(key).cloned())
}

fn with(key: &str, value: &str) -> HashMap<String, String> {
    let mut map = valid();
    map.insert(key.to_string(), value.to_string());
    map
}

fn without(key: &str) -> HashMap<String, String> {
    let mut map = valid();
    map.remove(key);
    map
}

#[test]
fn minimal_s3_config_gets_defaults() {
    let config = load(&valid()).unwrap();

    assert_eq!(config.db.port, 3306);
    assert_eq!(config.db.password.expose(), "hunter2");
    assert_eq!(config.cadence, Cadence::Weekly);
    assert!(matches!(config.store, StoreConfig::S3 { ref region, endpoint: None, .. } if region == "eu-west-1"));
    assert_eq!(config.datadir, PathBuf::from("/var/lib/mysql"));
    assert_eq!(config.owner.as_deref(), Some("mysql:mysql"));
    assert_eq!(config.server, ServerLifecycle::Systemd { unit: "mariadb".into() });
    assert_eq!(config.archive_format, ArchiveFormat::Gzip);
    assert_eq!(config.retry, RetryPolicy::default());
    assert_eq!(config.capture_timeout, Duration::from_secs(21_600));
    assert_eq!(config.state_dir, PathBuf::from("/var/tmp/backupmate/catalog"));
    assert_eq!(config.staging_root(), PathBuf::from("/var/tmp/backupmate/staging"));
    assert_eq!(config.log.level, "info");
    assert_eq!(config.log.format, LogFormat::Text);
}

#[test]
fn password_is_redacted_in_debug_output() {
    let config = load(&valid()).unwrap();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("***"));
}

#[test]
fn every_missing_key_is_reported_at_once() {
    let mut map = without("DB_HOST");
    map.remove("S3_BUCKET_NAME");
    map.remove("AWS_REGION");

    match load(&map).unwrap_err() {
        ConfigError::Missing(keys) => assert_eq!(keys, vec!["DB_HOST", "S3_BUCKET_NAME", "AWS_REGION"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn blank_values_count_as_missing() {
    assert!(matches!(load(&with("DB_USER", "  ")), Err(ConfigError::Missing(keys)) if keys == vec!["DB_USER"]));
}

#[yare::parameterized(
    port_not_a_number   = { "DB_PORT", "mysql" },
    port_out_of_range   = { "DB_PORT", "70000" },
    relative_binary     = { "MARIADB_BACKUP_PATH", "bin/mariabackup" },
    relative_temp_dir   = { "LOCAL_TEMP_DIR", "tmp" },
    full_prefix_slash   = { "FULL_BACKUP_PREFIX", "full" },
    inc_prefix_slash    = { "INCREMENTAL_BACKUP_PREFIX", "incremental" },
    unknown_schedule    = { "FULL_BACKUP_SCHEDULE", "daily" },
    unknown_store       = { "OBJECT_STORE", "gcs" },
    unknown_server      = { "SERVER_CONTROL", "upstart" },
    zero_attempts       = { "RETRY_MAX_ATTEMPTS", "0" },
    archive_format      = { "ARCHIVE_FORMAT", "bz2" },
    log_format          = { "LOG_FORMAT", "xml" },
    relative_state_dir  = { "STATE_DIR", "state" },
    relative_datadir    = { "MARIADB_DATADIR", "mysql" },
)]
fn rejects_invalid_values(key: &str, value: &str) {
    match load(&with(key, value)).unwrap_err() {
        ConfigError::Invalid { key: reported, .. } => assert_eq!(reported, key),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn local_store_needs_a_root_instead_of_credentials() {
    let mut map = valid();
    for key in ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_REGION"] {
        map.remove(key);
    }
    map.insert("OBJECT_STORE".into(), "local".into());
    assert!(matches!(load(&map), Err(ConfigError::Missing(keys)) if keys == vec!["LOCAL_STORE_ROOT"]));

    map.insert("LOCAL_STORE_ROOT".into(), "/srv/store".into());
    let config = load(&map).unwrap();
    assert_eq!(config.store, StoreConfig::Local { root: PathBuf::from("/srv/store") });
}

#[yare::parameterized(
    systemd = { "systemd", ServerLifecycle::Systemd { unit: "mysql".into() } },
    service = { "service", ServerLifecycle::ServiceScript { service: "mysql".into() } },
    none    = { "none", ServerLifecycle::Noop },
)]
fn server_control_variants(value: &str, expected: ServerLifecycle) {
    let mut map = with("SERVER_CONTROL", value);
    map.insert("MARIADB_SERVICE_NAME".into(), "mysql".into());
    assert_eq!(load(&map).unwrap().server, expected);
}

#[test]
fn empty_owner_disables_ownership_reconciliation() {
    assert_eq!(load(&with("MARIADB_OWNER", "")).unwrap().owner, None);
    assert_eq!(load(&with("MARIADB_OWNER", "mariadb:mariadb")).unwrap().owner.as_deref(), Some("mariadb:mariadb"));
}

#[test]
fn optional_settings_are_applied() {
    let mut map = valid();
    for (k, v) in [
        ("STATE_DIR", "/var/lib/backupmate"),
        ("MARIADB_DATADIR", "/data/mysql"),
        ("INNODB_LOG_GROUP_HOME_DIR", "/data/redo"),
        ("ARCHIVE_FORMAT", "zst"),
        ("RETRY_MAX_ATTEMPTS", "5"),
        ("RETRY_INITIAL_DELAY_MS", "10"),
        ("CAPTURE_TIMEOUT_SECS", "60"),
        ("S3_ENDPOINT", "http://minio:9000"),
        ("LOG_FORMAT", "json"),
    ] {
        map.insert(k.into(), v.into());
    }

    let config = load(&map).unwrap();
    assert_eq!(config.state_dir, PathBuf::from("/var/lib/backupmate"));
    assert_eq!(config.datadir, PathBuf::from("/data/mysql"));
    assert_eq!(config.innodb_log_group_home_dir, Some(PathBuf::from("/data/redo")));
    assert_eq!(config.innodb_data_home_dir, None);
    assert_eq!(config.archive_format, ArchiveFormat::Zstd);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.initial_delay, Duration::from_millis(10));
    assert_eq!(config.capture_timeout, Duration::from_secs(60));
    assert!(matches!(config.store, StoreConfig::S3 { endpoint: Some(ref e), .. } if e == "http://minio:9000"));
    assert_eq!(config.log.format, LogFormat::Json);

    let capture = config.capture_config();
    assert_eq!(capture.datadir, PathBuf::from("/data/mysql"));
    assert_eq!(capture.timeout, Duration::from_secs(60));
    assert_eq!(config.backup_settings().archive_format, ArchiveFormat::Zstd);
    assert!(!config.restore_settings(false, true).stop_server);
}

#[test]
#[serial]
fn file_values_override_the_environment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("backupmate.env");
    let mut contents: String = valid()
        .into_iter()
        .filter(|(k, _)| k != "DB_HOST")
        .map(|(k, v)| format!("{}={}\n", k, v))
        .collect();
    contents.push_str("DB_USER=from-file\n");
    std::fs::write(&path, contents).unwrap();

    std::env::set_var("DB_HOST", "from-env");
    std::env::set_var("DB_USER", "env-user");
    let config = Config::load(Some(&path));
    std::env::remove_var("DB_HOST");
    std::env::remove_var("DB_USER");

    let config = config.unwrap();
    assert_eq!(config.db.host, "from-env");
    assert_eq!(config.db.user, "from-file");
}

#[test]
#[serial]
fn named_file_must_exist() {
    let dir = tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("absent.env"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
