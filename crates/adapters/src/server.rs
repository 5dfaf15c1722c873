// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database server lifecycle control.

use crate::subprocess::{run_with_timeout, stderr_tail, SubprocessError, SERVICE_COMMAND_TIMEOUT};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("{command} exited with code {code:?}: {stderr}")]
    Failed { command: String, code: Option<i32>, stderr: String },
}

impl ServerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Subprocess(SubprocessError::Timeout { .. }) => true,
            ServerError::Subprocess(_) => false,
            ServerError::Failed { .. } => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServerError::Subprocess(SubprocessError::Cancelled { .. }))
    }
}

/// Stop and start the database server around a restore
#[async_trait]
pub trait ServerControl: Clone + Send + Sync + 'static {
    async fn stop(&self) -> Result<(), ServerError>;
    async fn start(&self) -> Result<(), ServerError>;
}

/// How the server is managed on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLifecycle {
    /// `systemctl stop|start <unit>`
    Systemd { unit: String },
    /// `service <name> stop|start`
    ServiceScript { service: String },
    /// The operator manages the server.
    Noop,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Stop,
    Start,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Stop => "stop",
            Action::Start => "start",
        }
    }
}

impl ServerLifecycle {
    /// Program and arguments for `action`, or `None` for `Noop`.
    fn command_line(&self, action: Action) -> Option<(&'static str, Vec<String>)> {
        match self {
            ServerLifecycle::Systemd { unit } => {
                Some(("systemctl", vec![action.as_str().to_string(), unit.clone()]))
            }
            ServerLifecycle::ServiceScript { service } => {
                Some(("service", vec![service.clone(), action.as_str().to_string()]))
            }
            ServerLifecycle::Noop => None,
        }
    }

    async fn run(&self, action: Action, cancel: &CancellationToken) -> Result<(), ServerError> {
        let Some((program, args)) = self.command_line(action) else {
            tracing::info!(action = action.as_str(), "server control disabled, skipping");
            return Ok(());
        };
        let command = format!("{} {}", program, args.join(" "));
        tracing::info!(%command, "server control");

        let mut cmd = Command::new(program);
        cmd.args(&args);
        let output = run_with_timeout(cmd, SERVICE_COMMAND_TIMEOUT, &command, cancel).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ServerError::Failed { command, code: output.status.code(), stderr: stderr_tail(&output) })
        }
    }
}

impl fmt::Display for ServerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerLifecycle::Systemd { unit } => write!(f, "systemd ({})", unit),
            ServerLifecycle::ServiceScript { service } => write!(f, "service ({})", service),
            ServerLifecycle::Noop => f.write_str("none"),
        }
    }
}

/// Production server control: a lifecycle plus the run's cancellation token.
#[derive(Debug, Clone)]
pub struct SystemServer {
    lifecycle: ServerLifecycle,
    cancel: CancellationToken,
}

impl SystemServer {
    pub fn new(lifecycle: ServerLifecycle, cancel: CancellationToken) -> Self {
        Self { lifecycle, cancel }
    }
}

#[async_trait]
impl ServerControl for SystemServer {
    async fn stop(&self) -> Result<(), ServerError> {
        self.lifecycle.run(Action::Stop, &self.cancel).await
    }

    async fn start(&self) -> Result<(), ServerError> {
        self.lifecycle.run(Action::Start, &self.cancel).await
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ServerControl, ServerError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded server control call
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ServerCall {
        Stop,
        Start,
    }

    #[derive(Default)]
    struct FakeServerState {
        calls: Vec<ServerCall>,
        fail_stop: u32,
        fail_start: u32,
    }

    /// Fake server control for testing
    #[derive(Clone, Default)]
    pub struct FakeServer {
        inner: Arc<Mutex<FakeServerState>>,
    }

    impl FakeServer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `times` stop calls fail.
        pub fn fail_stop(&self, times: u32) {
            self.inner.lock().fail_stop = times;
        }

        /// Make the next `times` start calls fail.
        pub fn fail_start(&self, times: u32) {
            self.inner.lock().fail_start = times;
        }

        pub fn calls(&self) -> Vec<ServerCall> {
            self.inner.lock().calls.clone()
        }
    }

    fn injected(command: &str) -> ServerError {
        ServerError::Failed {
            command: command.to_string(),
            code: Some(1),
            stderr: "injected failure".to_string(),
        }
    }

    #[async_trait]
    impl ServerControl for FakeServer {
        async fn stop(&self) -> Result<(), ServerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ServerCall::Stop);
            if inner.fail_stop > 0 {
                inner.fail_stop -= 1;
                return Err(injected("stop"));
            }
            Ok(())
        }

        async fn start(&self) -> Result<(), ServerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ServerCall::Start);
            if inner.fail_start > 0 {
                inner.fail_start -= 1;
                return Err(injected("start"));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeServer, ServerCall};

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
