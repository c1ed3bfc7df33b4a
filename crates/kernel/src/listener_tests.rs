// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener tests: envelope handling, routing, and the local surface.

use super::*;
use crate::dispatch::WorkerDispatch;
use clerk_advisor::{Guardrail, GuardrailPolicy};
use clerk_core::{ErrorCode, FakeClock};
use clerk_workflow::{ScriptedRunner, WorkflowDefinition, WorkflowRegistry};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

struct Fixture {
    ctx: Arc<KernelCtx<FakeClock>>,
    runner: ScriptedRunner,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (bus, pump) = EventBus::new();
    tokio::spawn(pump.run());
    let clock = FakeClock::at(1_700_000_000_000);
    let state = Arc::new(ConfigState::load(dir.path(), bus.clone()));
    let supervisor = Supervisor::new(
        bus.clone(),
        Arc::clone(&store),
        clock.clone(),
        Duration::from_millis(500),
    );
    let scheduler = Scheduler::start(
        Arc::clone(&store),
        bus.clone(),
        Arc::new(WorkerDispatch::new(Arc::clone(&supervisor))),
        clock.clone(),
        8,
    );
    let registry = Arc::new(WorkflowRegistry::new());
    let runner = ScriptedRunner::new();
    let engine = WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        bus.clone(),
        Arc::new(runner.clone()),
        clock.clone(),
    );
    let advisor = AdvisorService::new(
        Arc::clone(&store),
        registry,
        Guardrail::new(GuardrailPolicy::default()),
        clock.clone(),
    );
    let gateway = Gateway::new(Arc::clone(&store), clock.clone());
    let ctx = Arc::new(KernelCtx {
        store,
        bus,
        state,
        gateway,
        scheduler,
        supervisor,
        engine,
        advisor,
        clock,
        start_time: Instant::now(),
        instance_id: "kernel-test".to_string(),
        shutdown: Arc::new(Notify::new()),
    });
    Fixture { ctx, runner, _dir: dir }
}

async fn call(f: &Fixture, request: Request) -> Response {
    let raw_len = serde_json::to_string(&request).map(|s| s.len()).unwrap_or(0);
    handle_request(&f.ctx, request, raw_len).await
}

#[tokio::test]
async fn ping_round_trips() {
    let f = fixture();
    let response = call(&f, Request::new("m1", "PING")).await;
    assert_eq!(response.id, "m1");
    assert!(response.success);
    assert_eq!(response.result.as_ref().unwrap()["message"], "PONG");
    assert!(response.timestamp > 0);
}

#[tokio::test]
async fn unknown_operation_is_rejected_up_front() {
    let f = fixture();
    let response = call(&f, Request::new("m2", "FLY_TO_MOON")).await;
    assert_eq!(response.id, "m2");
    assert!(!response.success);
    assert_eq!(response.error_code(), Some(ErrorCode::UnknownOperation));
}

#[tokio::test]
async fn gateway_rejection_short_circuits() {
    let f = fixture();
    let request = Request::new("m3", "EXPORT_PDF").with_payload(json!({"path": "../../etc/x.pdf"}));
    let response = call(&f, request).await;
    assert_eq!(response.error_code(), Some(ErrorCode::ValidationFailed));
    // The router never saw it; no task history row exists.
    assert!(f.ctx.store.recent_tasks(10).is_empty());
}

#[tokio::test]
async fn worker_operation_without_worker_reports_unavailable() {
    let f = fixture();
    let response = call(&f, Request::new("m4", "EXPORT_PDF").with_payload(json!({"path": "a.pdf"}))).await;
    assert_eq!(response.error_code(), Some(ErrorCode::EngineUnavailable));
    // Scheduler recorded the attempt.
    let failed = f.ctx.store.tasks_with_status(clerk_storage::TaskStatus::Failed, 10);
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn status_surfaces_kernel_vitals() {
    let f = fixture();
    let response = call(&f, Request::new("m5", "GET_STATUS")).await;
    let result = response.result.unwrap();
    assert_eq!(result["instance_id"], "kernel-test");
    assert_eq!(result["scheduler"]["running"], true);
    assert_eq!(result["pending_approvals"], 0);
}

#[tokio::test]
async fn workflow_surface_end_to_end() {
    let f = fixture();
    f.ctx.engine.registry().insert(
        WorkflowDefinition::from_json(
            r#"{"id": "gated", "steps": [
                {"id": "prep", "type": "task", "operation": "OCR_EXTRACT"},
                {"id": "gate", "type": "approval", "prompt": "Go?"}
            ]}"#,
        )
        .unwrap(),
    );
    f.runner.answer("OCR_EXTRACT", json!({"text": "hello"}));

    let start = call(
        &f,
        Request::new("m6", "START_WORKFLOW").with_payload(json!({"workflow_id": "gated"})),
    )
    .await;
    assert!(start.success);
    let execution_id =
        start.result.unwrap()["execution_id"].as_str().unwrap().to_string();

    // Wait for the approval to park the execution.
    for _ in 0..200 {
        let pending = call(&f, Request::new("m7", "GET_PENDING_APPROVALS")).await;
        if pending.result.as_ref().unwrap()["approvals"].as_array().unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let resolve = call(
        &f,
        Request::new("m8", "RESOLVE_APPROVAL").with_payload(json!({
            "execution_id": execution_id,
            "step_id": "gate",
            "decision": "APPROVE",
            "actor": "erika",
        })),
    )
    .await;
    assert!(resolve.success);

    let again = call(
        &f,
        Request::new("m9", "RESOLVE_APPROVAL").with_payload(json!({
            "execution_id": execution_id,
            "step_id": "gate",
            "decision": "APPROVE",
            "actor": "erika",
        })),
    )
    .await;
    assert_eq!(again.error_code(), Some(ErrorCode::ApprovalAlreadyResolved));
}

#[tokio::test]
async fn trigger_surface_registers_and_lists() {
    let f = fixture();
    f.ctx.engine.registry().insert(
        WorkflowDefinition::from_json(
            r#"{"id": "w", "steps": [{"id": "s", "type": "task", "operation": "AI_QUERY"}]}"#,
        )
        .unwrap(),
    );

    let register = call(
        &f,
        Request::new("m1", "REGISTER_WORKFLOW_TRIGGER")
            .with_payload(json!({"topic": "document.scanned", "workflow_id": "w"})),
    )
    .await;
    assert!(register.success);

    let list = call(&f, Request::new("m2", "LIST_WORKFLOW_TRIGGERS")).await;
    assert_eq!(
        list.result.unwrap()["triggers"],
        json!([{"topic": "document.scanned", "workflow_id": "w"}])
    );

    let unregister = call(
        &f,
        Request::new("m3", "UNREGISTER_WORKFLOW_TRIGGER")
            .with_payload(json!({"topic": "document.scanned", "workflow_id": "w"})),
    )
    .await;
    assert_eq!(unregister.result.unwrap()["removed"], true);
}

#[tokio::test]
async fn draft_surface_returns_draft_only_artifacts() {
    let f = fixture();
    let response = call(
        &f,
        Request::new("m1", "GENERATE_DRAFT")
            .with_payload(json!({"kind": "workflow_skeleton", "params": {"workflow_id": "next"}})),
    )
    .await;
    let draft = &response.result.unwrap()["draft"];
    assert_eq!(draft["status"], "draft-only");
    assert_eq!(draft["content"]["id"], "next");

    let bad = call(
        &f,
        Request::new("m2", "GENERATE_DRAFT").with_payload(json!({"kind": "shell_script"})),
    )
    .await;
    assert_eq!(bad.error_code(), Some(ErrorCode::ValidationFailed));
}

#[tokio::test]
async fn stream_protocol_answers_every_line_exactly_once() {
    let f = fixture();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx = Arc::clone(&f.ctx);
    let listener = tokio::spawn(async move {
        run(ctx, BufReader::new(server_read), server_write).await;
    });

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(b"{\"id\":\"a\",\"type\":\"PING\"}\nnot json at all\n{\"id\":\"c\",\"type\":\"FLY_TO_MOON\"}\n{\"id\":\"d\",\"type\":\"GET_STATUS\"}\n")
        .await
        .unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let line = lines.next_line().await.unwrap().unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        seen.push((response.id.clone(), response.success, response.error_code()));
    }
    // Exactly one response per line, ids echoed (empty for unparseable).
    assert!(seen.contains(&("a".to_string(), true, None)));
    assert!(seen.contains(&("".to_string(), false, Some(ErrorCode::ValidationFailed))));
    assert!(seen.contains(&("c".to_string(), false, Some(ErrorCode::UnknownOperation))));
    assert!(seen.contains(&("d".to_string(), true, None)));

    // EOF stops the listener.
    drop(client_write);
    let _ = tokio::time::timeout(Duration::from_secs(2), listener).await;
}

#[tokio::test]
async fn shutdown_request_stops_the_listener() {
    let f = fixture();
    let (client, server) = tokio::io::duplex(4 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx = Arc::clone(&f.ctx);
    let listener = tokio::spawn(async move {
        run(ctx, BufReader::new(server_read), server_write).await;
    });

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"{\"id\":\"x\",\"type\":\"SHUTDOWN\"}\n").await.unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();
    assert!(response.success);
    assert_eq!(response.result.unwrap()["shutting_down"], true);

    tokio::time::timeout(Duration::from_secs(2), listener).await.unwrap().unwrap();
}
