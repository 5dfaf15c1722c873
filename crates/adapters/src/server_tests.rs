// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    systemd_stop   = { ServerLifecycle::Systemd { unit: "mariadb".into() }, Action::Stop, "systemctl", vec!["stop", "mariadb"] },
    systemd_start  = { ServerLifecycle::Systemd { unit: "mariadb".into() }, Action::Start, "systemctl", vec!["start", "mariadb"] },
    service_stop   = { ServerLifecycle::ServiceScript { service: "mysql".into() }, Action::Stop, "service", vec!["mysql", "stop"] },
    service_start  = { ServerLifecycle::ServiceScript { service: "mysql".into() }, Action::Start, "service", vec!["mysql", "start"] },
)]
fn command_lines(lifecycle: ServerLifecycle, action: Action, program: &str, args: Vec<&str>) {
    let (p, a) = lifecycle.command_line(action).unwrap();
    assert_eq!(p, program);
    assert_eq!(a, args);
}

#[tokio::test]
async fn noop_never_runs_anything() {
    let server = SystemServer::new(ServerLifecycle::Noop, CancellationToken::new());
    server.stop().await.unwrap();
    server.start().await.unwrap();
    assert!(ServerLifecycle::Noop.command_line(Action::Stop).is_none());
}

#[test]
fn display_names_the_mechanism() {
    assert_eq!(ServerLifecycle::Systemd { unit: "mariadb".into() }.to_string(), "systemd (mariadb)");
    assert_eq!(ServerLifecycle::Noop.to_string(), "none");
}

#[tokio::test]
async fn fake_fails_then_recovers() {
    let server = FakeServer::new();
    server.fail_stop(1);

    assert!(server.stop().await.is_err());
    server.stop().await.unwrap();
    server.start().await.unwrap();

    assert_eq!(server.calls(), vec![ServerCall::Stop, ServerCall::Stop, ServerCall::Start]);
}

#[test]
fn failures_are_retryable_but_cancellation_is_not() {
    let failed = ServerError::Failed { command: "systemctl stop mariadb".into(), code: Some(1), stderr: String::new() };
    assert!(failed.is_retryable());
    let cancelled = ServerError::Subprocess(SubprocessError::Cancelled { description: "x".into() });
    assert!(!cancelled.is_retryable());
    assert!(cancelled.is_cancelled());
}
