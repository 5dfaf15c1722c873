// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-backup cadence.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cadence '{0}' (expected 'weekly' or 'monthly')")]
pub struct CadenceParseError(pub String);

/// How often a new full backup starts a fresh chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Weekly,
    Monthly,
}

impl Cadence {
    /// When the next full backup is due after one taken at `last_full`.
    ///
    /// Monthly adds one calendar month, clamping to the end of shorter months
    /// (Jan 31 → Feb 28/29).
    pub fn next_full_due(self, last_full: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Weekly => last_full + Duration::days(7),
            Cadence::Monthly => {
                last_full.checked_add_months(Months::new(1)).unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }
}

impl FromStr for Cadence {
    type Err = CadenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(CadenceParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
