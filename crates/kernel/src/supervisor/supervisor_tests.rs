// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor tests against real scripted subprocesses.

#![cfg(unix)]

use super::*;
use clerk_core::FakeClock;
use serde_json::json;
use std::time::Duration;

/// POSIX-sh worker that announces ready and echoes a success reply for
/// every command, exiting cleanly on SHUTDOWN.
const ECHO_WORKER: &str = r#"#!/bin/sh
printf '{"type":"READY","engine":"echo","version":"1.0","capabilities":["echo"]}\n'
while IFS= read -r line; do
  case "$line" in
    *'"SHUTDOWN"'*) exit 0 ;;
  esac
  id=$(printf '%s' "$line" | sed 's/.*"id":"//;s/".*//')
  printf '{"id":"%s","success":true,"result":{"echoed":true}}\n' "$id"
done
"#;

/// Announces ready, then reads forever without ever answering.
const SILENT_WORKER: &str = r#"#!/bin/sh
printf '{"type":"READY","engine":"silent","version":"1.0","capabilities":[]}\n'
while IFS= read -r line; do :; done
"#;

/// Never announces ready.
const MUTE_WORKER: &str = r#"#!/bin/sh
sleep 30
"#;

/// Announces ready, then answers every command with a typed error.
const ERROR_WORKER: &str = r#"#!/bin/sh
printf '{"type":"READY","engine":"grumpy","version":"1.0","capabilities":[]}\n'
while IFS= read -r line; do
  case "$line" in
    *'"SHUTDOWN"'*) exit 0 ;;
  esac
  id=$(printf '%s' "$line" | sed 's/.*"id":"//;s/".*//')
  printf '{"id":"%s","success":false,"error":{"code":"TIMEOUT","message":"upstream deadline"}}\n' "$id"
done
"#;

/// Announces ready, then exits immediately.
const CRASH_WORKER: &str = r#"#!/bin/sh
printf '{"type":"READY","engine":"crashy","version":"1.0","capabilities":[]}\n'
exit 1
"#;

struct Fixture {
    supervisor: Arc<Supervisor<FakeClock>>,
    store: Arc<Store>,
    _dir: tempfile::TempDir,
    dir_path: std::path::PathBuf,
}

fn fixture(ready_timeout: Duration) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let dir_path = dir.path().to_path_buf();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (bus, pump) = EventBus::new();
    tokio::spawn(pump.run());
    let supervisor =
        Supervisor::new(bus, Arc::clone(&store), FakeClock::at(1_000_000), ready_timeout);
    Fixture { supervisor, store, _dir: dir, dir_path }
}

fn script(fixture: &Fixture, name: &str, body: &str) -> WorkerSpec {
    use std::os::unix::fs::PermissionsExt;
    let path = fixture.dir_path.join(format!("{name}.sh"));
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    WorkerSpec {
        name: name.to_string(),
        program: "sh".to_string(),
        args: vec![path.to_string_lossy().into_owned()],
    }
}

#[tokio::test]
async fn ready_handshake_then_round_trip() {
    let f = fixture(Duration::from_secs(5));
    f.supervisor.start_worker(script(&f, "echo", ECHO_WORKER)).await.unwrap();

    assert_eq!(f.supervisor.worker_health("echo"), Some(WorkerHealth::Ready));
    let result = f
        .supervisor
        .send("echo", "do_thing", json!({"x": 1}), "cmd-1", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result, json!({"echoed": true}));

    let status = f.supervisor.engine_status();
    assert_eq!(status["echo"]["health"], "ready");
    assert_eq!(status["echo"]["engine"], "echo");
    assert_eq!(status["echo"]["capabilities"][0], "echo");

    f.supervisor.shutdown_all(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn concurrent_requests_multiplex_by_correlation_id() {
    let f = fixture(Duration::from_secs(5));
    f.supervisor.start_worker(script(&f, "echo", ECHO_WORKER)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let supervisor = Arc::clone(&f.supervisor);
        handles.push(tokio::spawn(async move {
            supervisor
                .send("echo", "do_thing", json!({"i": i}), &format!("cmd-{i}"), Duration::from_secs(5))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    f.supervisor.shutdown_all(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn missed_ready_deadline_is_a_start_failure() {
    let f = fixture(Duration::from_millis(300));
    let err = f.supervisor.start_worker(script(&f, "mute", MUTE_WORKER)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::EngineUnavailable);
    assert!(err.message.contains("ready handshake"));
    // Not registered; requests fail fast.
    let send_err = f
        .supervisor
        .send("mute", "x", Value::Null, "cmd-1", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(send_err.code, ErrorCode::EngineUnavailable);
}

#[tokio::test]
async fn response_deadline_reports_timeout_without_leaking() {
    let f = fixture(Duration::from_secs(5));
    f.supervisor.start_worker(script(&f, "silent", SILENT_WORKER)).await.unwrap();

    let err = f
        .supervisor
        .send("silent", "x", Value::Null, "cmd-9", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);

    let worker = f.supervisor.workers.lock().get("silent").cloned().unwrap();
    assert_eq!(worker.pending_len(), 0);
    f.supervisor.shutdown_all(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn worker_error_codes_pass_through_when_known() {
    let f = fixture(Duration::from_secs(5));
    f.supervisor.start_worker(script(&f, "grumpy", ERROR_WORKER)).await.unwrap();

    let err = f
        .supervisor
        .send("grumpy", "x", Value::Null, "cmd-1", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
    assert_eq!(err.message, "upstream deadline");
    f.supervisor.shutdown_all(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn crash_restarts_until_the_budget_then_dead_letters() {
    let f = fixture(Duration::from_secs(5));
    // First start succeeds (READY arrives), then the process dies and the
    // supervisor restarts it up to the budget.
    f.supervisor.start_worker(script(&f, "crashy", CRASH_WORKER)).await.unwrap();

    // Give the exit handler time to burn through the restart budget.
    for _ in 0..100 {
        if f.supervisor.dead.lock().contains("crashy") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(f.supervisor.dead.lock().contains("crashy"), "worker should be dead-lettered");
    assert_eq!(f.supervisor.engine_status()["crashy"]["dead_lettered"], json!(true));

    // The audit trail shows restarts and the final dead-letter entry.
    assert!(!f.store.activity_by_action("engine.restarted", 10).is_empty());
    assert_eq!(f.store.activity_by_action("engine.dead", 10).len(), 1);

    let err = f
        .supervisor
        .send("crashy", "x", Value::Null, "cmd-1", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EngineUnavailable);
}

#[tokio::test]
async fn unknown_worker_is_unavailable() {
    let f = fixture(Duration::from_secs(1));
    let err = f
        .supervisor
        .send("ghost", "x", Value::Null, "cmd-1", Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EngineUnavailable);
}

#[tokio::test]
async fn shutdown_is_quiet_about_intentional_exits() {
    let f = fixture(Duration::from_secs(5));
    f.supervisor.start_worker(script(&f, "echo", ECHO_WORKER)).await.unwrap();
    f.supervisor.shutdown_all(Duration::from_secs(2)).await;

    // No unexpected-exit activity for a clean shutdown.
    assert!(f.store.activity_by_action("engine.stopped", 10).is_empty());
    assert_eq!(f.supervisor.worker_health("echo"), Some(WorkerHealth::Stopped));
}
