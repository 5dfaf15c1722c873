// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod backup;
pub mod list;
pub mod reconcile;
pub mod restore;

use crate::config::Config;
use crate::exit_error::{code, ExitError};
use bm_storage::Catalog;

/// Open the catalog under the configured state directory.
pub(crate) fn open_catalog(config: &Config) -> Result<Catalog, ExitError> {
    Catalog::open(&config.state_dir).map_err(|e| {
        ExitError::new(
            code::INTERNAL,
            format!("cannot open catalog at {}: {}", config.state_dir.display(), e),
        )
    })
}
