// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow scenarios: sequential chains, DAG parallelism, approvals.

use super::helpers::kernel;
use clerk_storage::{ExecutionStatus, StepStatus};
use clerk_wire::Request;
use serde_json::json;

#[tokio::test]
async fn sequential_workflow_flows_results_between_steps() {
    let k = kernel();
    k.define(
        r#"{"id": "two-step", "steps": [
            {"id": "s1", "type": "task", "operation": "OCR_EXTRACT"},
            {"id": "s2", "type": "task", "operation": "AI_QUERY",
             "input": {"prev": "${s1.result}"}}
        ]}"#,
    );
    k.runner.answer("OCR_EXTRACT", json!({"result": "ok-A"}));
    k.runner.answer("AI_QUERY", json!({"result": "ok-B"}));

    let started = k
        .request(
            Request::new("m1", "START_WORKFLOW")
                .with_payload(json!({"workflow_id": "two-step", "context": {"x": 1}})),
        )
        .await;
    assert!(started.success);
    let execution_id = started.result.unwrap()["execution_id"].as_str().unwrap().to_string();
    k.wait_for_status(&execution_id, ExecutionStatus::Completed).await;

    let steps = k.store.steps_for_execution(&execution_id);
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));

    // s2's input carried s1's output forward.
    assert_eq!(k.runner.calls_for("AI_QUERY"), vec![json!({"prev": "ok-A"})]);
}

#[tokio::test]
async fn dag_runs_the_fanout_after_load_and_merge_last() {
    let k = kernel();
    k.define(
        r#"{"id": "diamond", "max_parallelism": 3, "steps": [
            {"id": "load", "type": "task", "operation": "LIST_TEMPLATES"},
            {"id": "a", "type": "task", "operation": "EXPORT_PDF", "depends_on": ["load"]},
            {"id": "b", "type": "task", "operation": "EXPORT_EXCEL", "depends_on": ["load"]},
            {"id": "c", "type": "task", "operation": "EXPORT_IMAGE", "depends_on": ["load"]},
            {"id": "merge", "type": "task", "operation": "COMPRESS_DATA",
             "depends_on": ["a", "b", "c"]}
        ]}"#,
    );
    for op in ["LIST_TEMPLATES", "EXPORT_PDF", "EXPORT_EXCEL", "EXPORT_IMAGE", "COMPRESS_DATA"] {
        k.runner.answer(op, json!({"op": op}));
    }

    let started = k
        .request(
            Request::new("m1", "START_WORKFLOW").with_payload(json!({"workflow_id": "diamond"})),
        )
        .await;
    let execution_id = started.result.unwrap()["execution_id"].as_str().unwrap().to_string();
    k.wait_for_status(&execution_id, ExecutionStatus::Completed).await;

    let ops: Vec<String> = k.runner.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops.first().map(String::as_str), Some("LIST_TEMPLATES"));
    assert_eq!(ops.last().map(String::as_str), Some("COMPRESS_DATA"));

    // The fan-out steps all started after load completed and before merge
    // started; their started_at stamps sit inside that window.
    let steps = k.store.steps_for_execution(&execution_id);
    let stamp = |id: &str| {
        let row = steps.iter().find(|s| s.step_id == id).unwrap();
        (row.started_at, row.completed_at.unwrap())
    };
    let (_, load_done) = stamp("load");
    let (merge_start, _) = stamp("merge");
    for id in ["a", "b", "c"] {
        let (started_at, completed_at) = stamp(id);
        assert!(started_at >= load_done, "{id} started before load finished");
        assert!(completed_at <= merge_start, "merge started before {id} finished");
    }
}

#[tokio::test]
async fn approval_reject_fails_the_workflow_deterministically() {
    let k = kernel();
    k.define(
        r#"{"id": "gated", "steps": [
            {"id": "prep", "type": "task", "operation": "OCR_EXTRACT"},
            {"id": "gate", "type": "approval", "prompt": "Send it?"},
            {"id": "send", "type": "task", "operation": "EXTERNAL_API_CALL"}
        ]}"#,
    );
    k.runner.answer("OCR_EXTRACT", json!({}));
    k.runner.answer("EXTERNAL_API_CALL", json!({}));

    let started = k
        .request(Request::new("m1", "START_WORKFLOW").with_payload(json!({"workflow_id": "gated"})))
        .await;
    let execution_id = started.result.unwrap()["execution_id"].as_str().unwrap().to_string();
    k.wait_for_status(&execution_id, ExecutionStatus::PausedForApproval).await;

    let resolved = k
        .request(Request::new("m2", "RESOLVE_APPROVAL").with_payload(json!({
            "execution_id": execution_id,
            "step_id": "gate",
            "decision": "REJECT",
            "actor": "erika",
        })))
        .await;
    assert!(resolved.success);
    k.wait_for_status(&execution_id, ExecutionStatus::Failed).await;

    // Decision recorded; the send step never ran.
    let approval = k.store.approval_for_step(&execution_id, "gate").unwrap();
    assert_eq!(approval.decision.as_deref(), Some("REJECT"));
    assert!(k.runner.calls_for("EXTERNAL_API_CALL").is_empty());
}

#[tokio::test]
async fn advisor_surface_audits_what_it_returns() {
    let k = kernel();
    let response = k
        .request(Request::new("m1", "GET_AI_SUGGESTIONS").with_payload(json!({})))
        .await;
    assert!(response.success);
    // Fresh kernel: no history, no suggestions, no audits.
    assert_eq!(response.result.unwrap()["suggestions"], json!([]));
    assert!(k.store.suggestion_audits(None, 10).is_empty());

    let draft = k
        .request(
            Request::new("m2", "GENERATE_DRAFT")
                .with_payload(json!({"kind": "doc_snippet", "params": {"subject": "export"}})),
        )
        .await;
    assert!(draft.success);
    let audits = k.store.draft_audits(10);
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, "draft-only");
}
