// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings from an env-style file, falling back to the process environment.
//!
//! Keys present in the file win over the environment. Everything is
//! validated up front so a bad setting never reaches a backup or restore.

use crate::logging::{LogConfig, LogFormat};
use bm_adapters::{ArchiveFormat, MariaBackupConfig, ServerLifecycle, StoreConfig};
use bm_core::Cadence;
use bm_engine::{BackupSettings, RestoreSettings, RetryPolicy};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".backupmate.env";
/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BACKUPMATE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: dotenvy::Error },
    #[error("missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

/// A value kept out of debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub mariabackup_path: PathBuf,
    pub datadir: PathBuf,
    pub innodb_data_home_dir: Option<PathBuf>,
    pub innodb_log_group_home_dir: Option<PathBuf>,
    /// `user:group` for the restored data directory; `None` skips chown.
    pub owner: Option<String>,
    pub bucket: String,
    pub store: StoreConfig,
    pub full_prefix: String,
    pub incremental_prefix: String,
    pub cadence: Cadence,
    pub local_temp_dir: PathBuf,
    /// Where the catalog lives. Defaults to `<LOCAL_TEMP_DIR>/catalog`.
    pub state_dir: PathBuf,
    pub server: ServerLifecycle,
    pub archive_format: ArchiveFormat,
    pub retry: RetryPolicy,
    pub capture_timeout: Duration,
    pub log: LogConfig,
}

impl Config {
    /// Load from `explicit`, else `$BACKUPMATE_CONFIG`, else `.backupmate.env`
    /// if it exists. A named file that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, must_exist) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => (PathBuf::from(path), true),
                None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };
        let file = if must_exist || path.exists() { read_env_file(&path)? } else { HashMap::new() };
        Self::from_lookup(|key| file.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut r = Reader { lookup, missing: Vec::new() };

        let host = r.required("DB_HOST");
        let port = r.required("DB_PORT");
        let user = r.required("DB_USER");
        let password = r.required("DB_PASSWORD");
        let mariabackup_path = r.required("MARIADB_BACKUP_PATH");
        let bucket = r.required("S3_BUCKET_NAME");
        let local_temp_dir = r.required("LOCAL_TEMP_DIR");
        let full_prefix = r.required("FULL_BACKUP_PREFIX");
        let incremental_prefix = r.required("INCREMENTAL_BACKUP_PREFIX");
        let schedule = r.required("FULL_BACKUP_SCHEDULE");

        let store_kind = r.optional("OBJECT_STORE").unwrap_or_else(|| "s3".to_string());
        let store_values = match store_kind.as_str() {
            "s3" => StoreValues::S3 {
                access_key_id: r.required("AWS_ACCESS_KEY_ID"),
                secret_access_key: r.required("AWS_SECRET_ACCESS_KEY"),
                region: r.required("AWS_REGION"),
                endpoint: r.optional("S3_ENDPOINT"),
            },
            "local" => StoreValues::Local { root: r.required("LOCAL_STORE_ROOT") },
            _ => return Err(invalid("OBJECT_STORE", &store_kind, "expected 's3' or 'local'")),
        };

        if !r.missing.is_empty() {
            return Err(ConfigError::Missing(r.missing));
        }

        let local_temp_dir = absolute("LOCAL_TEMP_DIR", &local_temp_dir)?;
        let store = match store_values {
            StoreValues::S3 { access_key_id, secret_access_key, region, endpoint } => {
                StoreConfig::S3 { region, access_key_id, secret_access_key, endpoint }
            }
            StoreValues::Local { root } => StoreConfig::Local { root: absolute("LOCAL_STORE_ROOT", &root)? },
        };

        let service = r.optional("MARIADB_SERVICE_NAME").unwrap_or_else(|| "mariadb".to_string());
        let server = match r.optional("SERVER_CONTROL").as_deref().unwrap_or("systemd") {
            "systemd" => ServerLifecycle::Systemd { unit: service },
            "service" => ServerLifecycle::ServiceScript { service },
            "none" => ServerLifecycle::Noop,
            other => return Err(invalid("SERVER_CONTROL", other, "expected 'systemd', 'service' or 'none'")),
        };

        let retry = RetryPolicy {
            max_attempts: r.parsed_or("RETRY_MAX_ATTEMPTS", 3)?,
            initial_delay: Duration::from_millis(r.parsed_or("RETRY_INITIAL_DELAY_MS", 1000)?),
            max_delay: Duration::from_millis(r.parsed_or("RETRY_MAX_DELAY_MS", 30_000)?),
            multiplier: 2.0,
        };
        if retry.max_attempts == 0 {
            return Err(invalid("RETRY_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        let state_dir = match r.optional("STATE_DIR") {
            Some(dir) => absolute("STATE_DIR", &dir)?,
            None => local_temp_dir.join("catalog"),
        };

        Ok(Config {
            db: DbConfig {
                host,
                port: parse("DB_PORT", &port)?,
                user,
                password: Secret(password),
            },
            mariabackup_path: absolute("MARIADB_BACKUP_PATH", &mariabackup_path)?,
            datadir: match r.optional("MARIADB_DATADIR") {
                Some(dir) => absolute("MARIADB_DATADIR", &dir)?,
                None => PathBuf::from("/var/lib/mysql"),
            },
            innodb_data_home_dir: r.optional_path("INNODB_DATA_HOME_DIR")?,
            innodb_log_group_home_dir: r.optional_path("INNODB_LOG_GROUP_HOME_DIR")?,
            // Present but empty disables ownership reconciliation.
            owner: match r.raw("MARIADB_OWNER") {
                None => Some("mysql:mysql".to_string()),
                Some(owner) if owner.is_empty() => None,
                Some(owner) => Some(owner),
            },
            bucket,
            store,
            full_prefix: prefix("FULL_BACKUP_PREFIX", full_prefix)?,
            incremental_prefix: prefix("INCREMENTAL_BACKUP_PREFIX", incremental_prefix)?,
            cadence: parse("FULL_BACKUP_SCHEDULE", &schedule)?,
            local_temp_dir,
            state_dir,
            server,
            archive_format: r.parsed_or("ARCHIVE_FORMAT", ArchiveFormat::Gzip)?,
            retry,
            capture_timeout: Duration::from_secs(r.parsed_or("CAPTURE_TIMEOUT_SECS", 21_600)?),
            log: LogConfig {
                level: r.optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                format: r.parsed_or("LOG_FORMAT", LogFormat::Text)?,
                file: r.optional("LOG_FILE").map(PathBuf::from),
            },
        })
    }

    pub fn staging_root(&self) -> PathBuf {
        self.local_temp_dir.join("staging")
    }

    pub fn capture_config(&self) -> MariaBackupConfig {
        MariaBackupConfig {
            binary: self.mariabackup_path.clone(),
            host: self.db.host.clone(),
            port: self.db.port,
            user: self.db.user.clone(),
            password: self.db.password.expose().to_string(),
            datadir: self.datadir.clone(),
            innodb_data_home_dir: self.innodb_data_home_dir.clone(),
            innodb_log_group_home_dir: self.innodb_log_group_home_dir.clone(),
            owner: self.owner.clone(),
            timeout: self.capture_timeout,
        }
    }

    pub fn backup_settings(&self) -> BackupSettings {
        BackupSettings {
            bucket: self.bucket.clone(),
            full_prefix: self.full_prefix.clone(),
            incremental_prefix: self.incremental_prefix.clone(),
            cadence: self.cadence,
            staging_root: self.staging_root(),
            archive_format: self.archive_format,
        }
    }

    pub fn restore_settings(&self, stop_server: bool, start_server: bool) -> RestoreSettings {
        RestoreSettings {
            bucket: self.bucket.clone(),
            staging_root: self.staging_root(),
            stop_server,
            start_server,
        }
    }
}

enum StoreValues {
    S3 { access_key_id: String, secret_access_key: String, region: String, endpoint: Option<String> },
    Local { root: String },
}

struct Reader<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F: Fn(&str) -> Option<String>> Reader<F> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string())
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &'static str) -> String {
        self.optional(key).unwrap_or_else(|| {
            self.missing.push(key);
            String::new()
        })
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(value) => parse(key, &value),
            None => Ok(default),
        }
    }

    fn optional_path(&self, key: &'static str) -> Result<Option<PathBuf>, ConfigError> {
        self.optional(key).map(|v| absolute(key, &v)).transpose()
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let read_err = |source| ConfigError::Read { path: path.to_path_buf(), source };
    dotenvy::from_path_iter(path)
        .map_err(read_err)?
        .map(|item| item.map_err(read_err))
        .collect()
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string(), reason: reason.into() }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn absolute(key: &'static str, value: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(value);
    if !path.is_absolute() {
        return Err(invalid(key, value, "must be an absolute path"));
    }
    Ok(path)
}

fn prefix(key: &'static str, value: String) -> Result<String, ConfigError> {
    if !value.ends_with('/') {
        return Err(invalid(key, &value, "must end with '/'"));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
