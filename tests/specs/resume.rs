// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-and-resume: durable state survives a kernel restart.

use super::helpers::{kernel, kernel_over};
use clerk_storage::{ExecutionStatus, StepStatus};
use clerk_wire::Request;
use serde_json::json;
use std::sync::Arc;

const DIAMOND: &str = r#"{"id": "diamond", "steps": [
    {"id": "load", "type": "task", "operation": "LIST_TEMPLATES"},
    {"id": "a", "type": "task", "operation": "EXPORT_PDF", "depends_on": ["load"]},
    {"id": "b", "type": "task", "operation": "EXPORT_EXCEL", "depends_on": ["load"]},
    {"id": "merge", "type": "task", "operation": "COMPRESS_DATA", "depends_on": ["a", "b"]}
]}"#;

#[tokio::test]
async fn killed_mid_dag_resumes_from_the_frontier() {
    // First kernel: persist the picture a kill would leave behind —
    // load and a completed, b caught running, merge never started.
    let first = kernel();
    let execution_id = "wfx-spec-crash";
    first.store.execution_insert(execution_id, "diamond", &json!({}), 100);
    first.store.step_begin(execution_id, "load", "task", 0, 110);
    first.store.step_finish(
        execution_id,
        "load",
        StepStatus::Completed,
        Some(&json!({"templates": 3})),
        None,
        120,
    );
    first.store.step_begin(execution_id, "a", "task", 0, 130);
    first.store.step_finish(
        execution_id,
        "a",
        StepStatus::Completed,
        Some(&json!({"pdf": "done"})),
        None,
        140,
    );
    first.store.step_begin(execution_id, "b", "task", 0, 130);
    let store = Arc::clone(&first.store);
    drop(first);

    // Second kernel over the same store: resume and finish.
    let second = kernel_over(Some(store));
    second.define(DIAMOND);
    second.runner.answer("LIST_TEMPLATES", json!({"should": "never run"}));
    second.runner.answer("EXPORT_PDF", json!({"should": "never run"}));
    second.runner.answer("EXPORT_EXCEL", json!({"xlsx": "done"}));
    second.runner.answer("COMPRESS_DATA", json!({"merged": true}));

    assert_eq!(second.ctx.engine.resume_in_progress(), 1);
    second.wait_for_status(execution_id, ExecutionStatus::Completed).await;

    // Completed steps kept their results and never re-ran.
    assert!(second.runner.calls_for("LIST_TEMPLATES").is_empty());
    assert!(second.runner.calls_for("EXPORT_PDF").is_empty());
    // The interrupted step re-entered from its start; merge ran once.
    assert_eq!(second.runner.calls_for("EXPORT_EXCEL").len(), 1);
    assert_eq!(second.runner.calls_for("COMPRESS_DATA").len(), 1);

    let steps = second.store.steps_for_execution(execution_id);
    let load = steps.iter().find(|s| s.step_id == "load").unwrap();
    assert_eq!(load.result, Some(json!({"templates": 3})));
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn pending_approval_survives_restart_until_resolved() {
    let first = kernel();
    first.define(
        r#"{"id": "gated", "steps": [
            {"id": "gate", "type": "approval", "prompt": "Continue?"},
            {"id": "after", "type": "task", "operation": "AI_QUERY"}
        ]}"#,
    );
    let started = first
        .request(Request::new("m1", "START_WORKFLOW").with_payload(json!({"workflow_id": "gated"})))
        .await;
    let execution_id = started.result.unwrap()["execution_id"].as_str().unwrap().to_string();
    first.wait_for_status(&execution_id, ExecutionStatus::PausedForApproval).await;
    let store = Arc::clone(&first.store);
    drop(first);

    let second = kernel_over(Some(store));
    second.define(
        r#"{"id": "gated", "steps": [
            {"id": "gate", "type": "approval", "prompt": "Continue?"},
            {"id": "after", "type": "task", "operation": "AI_QUERY"}
        ]}"#,
    );
    second.runner.answer("AI_QUERY", json!({}));
    second.ctx.engine.resume_in_progress();

    // Still parked after restart.
    let pending = second
        .request(Request::new("m2", "GET_PENDING_APPROVALS"))
        .await;
    let approvals = pending.result.unwrap()["approvals"].clone();
    assert_eq!(approvals.as_array().unwrap().len(), 1);
    assert_eq!(approvals[0]["step_id"], "gate");

    let resolved = second
        .request(Request::new("m3", "RESOLVE_APPROVAL").with_payload(json!({
            "execution_id": execution_id,
            "step_id": "gate",
            "decision": "APPROVE",
            "actor": "erika",
        })))
        .await;
    assert!(resolved.success);
    second.wait_for_status(&execution_id, ExecutionStatus::Completed).await;
    assert_eq!(second.runner.calls_for("AI_QUERY").len(), 1);
}
