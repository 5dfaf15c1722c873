// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeout and cancellation.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default timeout for short service-management commands.
pub const SERVICE_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn {description}: {source}")]
    Spawn { description: String, source: io::Error },
    #[error("{description} timed out after {}s", timeout.as_secs())]
    Timeout { description: String, timeout: Duration },
    #[error("{description} was cancelled")]
    Cancelled { description: String },
    #[error("failed waiting for {description}: {source}")]
    Wait { description: String, source: io::Error },
}

/// Run a command to completion, collecting stdout and stderr.
///
/// The child is killed if the timeout elapses or `cancel` fires first.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
    cancel: &CancellationToken,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    if cancel.is_cancelled() {
        return Err(SubprocessError::Cancelled { description: description.to_string() });
    }

    let child = cmd
        .spawn()
        .map_err(|source| SubprocessError::Spawn { description: description.to_string(), source })?;
    let started = Instant::now();

    // Dropping the wait future drops the child, which kills it.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(description, "cancelling subprocess");
            Err(SubprocessError::Cancelled { description: description.to_string() })
        }
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(Ok(output)) => {
                tracing::debug!(
                    description,
                    code = ?output.status.code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "subprocess finished"
                );
                Ok(output)
            }
            Ok(Err(source)) => {
                Err(SubprocessError::Wait { description: description.to_string(), source })
            }
            Err(_) => {
                tracing::warn!(description, timeout_secs = timeout.as_secs(), "subprocess timed out");
                Err(SubprocessError::Timeout { description: description.to_string(), timeout })
            }
        },
    }
}

/// Render a program and its arguments for logs, masking secrets.
pub fn display_command<I, S>(program: &Path, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.into_iter().map(|a| redact_arg(&a.as_ref().to_string_lossy())));
    parts.join(" ")
}

fn redact_arg(arg: &str) -> String {
    match arg.split_once('=') {
        Some((flag, _)) if flag == "--password" => format!("{flag}=***"),
        _ => arg.to_string(),
    }
}

/// The last few lines of a command's stderr, for error messages.
pub fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
