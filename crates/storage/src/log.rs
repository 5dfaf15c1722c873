// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only catalog log.
//!
//! One JSON object per line: `{"seq": N, "event": {...}}`. Every append is
//! written, flushed and synced before it returns, so an acknowledged event
//! survives a crash.
//!
//! A crash mid-append can leave a torn final line. That line was never
//! acknowledged, so it is dropped on replay (and cut off when the log is
//! reopened for writing). A bad line anywhere else means the file was
//! damaged after the fact and is reported as corruption.

use bm_core::CatalogEvent;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt catalog entry at line {line}: {source}")]
    Corrupt { line: usize, source: serde_json::Error },
    #[error("catalog entry at line {line} has seq {found}, expected more than {previous}")]
    OutOfSequence { line: usize, previous: u64, found: u64 },
    #[error("failed to encode catalog entry: {0}")]
    Encode(serde_json::Error),
}

/// A single entry in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub event: CatalogEvent,
}

#[derive(Serialize)]
struct EntryRef<'a> {
    seq: u64,
    event: &'a CatalogEvent,
}

struct Replay {
    entries: Vec<LogEntry>,
    /// Byte length of the fully valid prefix.
    valid_len: u64,
    torn: bool,
}

/// Writer half of the catalog log.
pub struct CatalogLog {
    path: PathBuf,
    file: File,
    write_seq: u64,
}

impl CatalogLog {
    /// Open the log for appending, creating it if missing.
    ///
    /// Returns the log together with every acknowledged entry. A torn final
    /// line is truncated away. Callers must hold the catalog's exclusive lock.
    pub fn open(path: &Path) -> Result<(Self, Vec<LogEntry>), LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let replay = scan(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if replay.torn {
            warn!(
                path = %path.display(),
                valid_len = replay.valid_len,
                "dropping torn trailing catalog entry"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let write_seq = replay.entries.last().map(|e| e.seq).unwrap_or(0);
        let log = Self { path: path.to_path_buf(), file, write_seq };
        Ok((log, replay.entries))
    }

    /// Read every acknowledged entry without modifying the file.
    pub fn read(path: &Path) -> Result<Vec<LogEntry>, LogError> {
        let replay = scan(path)?;
        if replay.torn {
            debug!(path = %path.display(), "ignoring torn trailing catalog entry");
        }
        Ok(replay.entries)
    }

    /// Append an event durably and return its sequence number.
    pub fn append(&mut self, event: &CatalogEvent) -> Result<u64, LogError> {
        let seq = self.write_seq + 1;
        let mut line =
            serde_json::to_vec(&EntryRef { seq, event }).map_err(LogError::Encode)?;
        line.push(b'\n');

        append_line(&mut self.file, &line)?;
        self.write_seq = seq;

        debug!(seq, event = event.name(), backup_id = %event.backup_id(), "catalog append");
        Ok(seq)
    }

    /// Sequence number of the last written entry (0 if empty)
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The file operations an append needs.
trait LogFile: Write {
    fn size(&self) -> io::Result<u64>;
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn sync_data(&self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Write, flush and sync one line. On any failure the file is cut back to
/// its previous length so an unacknowledged entry never survives.
fn append_line<F: LogFile>(file: &mut F, line: &[u8]) -> io::Result<()> {
    let len = file.size()?;
    let result = file.write_all(line).and_then(|()| file.flush()).and_then(|()| file.sync_data());
    if let Err(e) = result {
        if let Err(rollback) = file.set_len(len).and_then(|()| file.sync_data()) {
            warn!(error = %rollback, len, "cannot roll back failed catalog append");
        }
        return Err(e);
    }
    Ok(())
}

fn scan(path: &Path) -> Result<Replay, LogError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Replay { entries: Vec::new(), valid_len: 0, torn: false });
        }
        Err(e) => return Err(e.into()),
    };

    let mut entries: Vec<LogEntry> = Vec::new();
    let mut offset = 0usize;
    let mut valid_len = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let (line, next, terminated) = match rest.iter().position(|b| *b == b'\n') {
            Some(i) => (&rest[..i], offset + i + 1, true),
            None => (rest, bytes.len(), false),
        };
        let is_last = next >= bytes.len();

        if line.iter().all(u8::is_ascii_whitespace) {
            if terminated {
                valid_len = next;
            }
            offset = next;
            continue;
        }

        // An unterminated line was never acknowledged, even if it parses.
        if !terminated {
            return Ok(Replay { entries, valid_len: valid_len as u64, torn: true });
        }

        match serde_json::from_slice::<LogEntry>(line) {
            Ok(entry) => {
                let previous = entries.last().map(|e| e.seq).unwrap_or(0);
                if entry.seq <= previous {
                    return Err(LogError::OutOfSequence { line: line_no, previous, found: entry.seq });
                }
                entries.push(entry);
                valid_len = next;
            }
            Err(_) if is_last => {
                return Ok(Replay { entries, valid_len: valid_len as u64, torn: true });
            }
            Err(source) => return Err(LogError::Corrupt { line: line_no, source }),
        }
        offset = next;
    }

    Ok(Replay { entries, valid_len: valid_len as u64, torn: false })
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
