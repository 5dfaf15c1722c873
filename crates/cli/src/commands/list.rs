// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! List command handler

use anyhow::Result;
use bm_core::BackupRecord;

use super::open_catalog;
use crate::config::Config;
use crate::output::{format_timestamp, print_json, OutputFormat, Table};

pub fn handle(config: &Config, format: OutputFormat) -> Result<()> {
    let catalog = open_catalog(config)?;
    let records = catalog.list()?;
    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Text if records.is_empty() => println!("No backups recorded"),
        OutputFormat::Text => print!("{}", render(&records)),
    }
    Ok(())
}

pub(crate) fn render(records: &[BackupRecord]) -> String {
    let mut table = Table::new(vec!["ID", "KIND", "CREATED", "STATUS", "PARENT"]);
    for record in records {
        table.row(vec![
            record.id.to_string(),
            record.kind.as_str().to_string(),
            format_timestamp(record.created_at),
            record.status.as_str().to_string(),
            record.parent_id.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.render()
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
