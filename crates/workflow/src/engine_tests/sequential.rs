// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::{ErrorCode, Fault};
use clerk_storage::StepStatus;
use serde_json::json;

#[tokio::test]
async fn two_step_chain_flows_results_forward() {
    let h = harness();
    h.engine.registry().insert(definition(
        "chain",
        vec![
            task("s1", "A", json!({})),
            task("s2", "B", json!({"prev": "${s1.result}"})),
        ],
    ));
    h.runner.answer("A", json!({"result": "ok-A"}));
    h.runner.answer("B", json!({"result": "ok-B"}));

    let execution = h.engine.start_workflow("chain", json!({"x": 1})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(steps[0].result, Some(json!({"result": "ok-A"})));

    // s2's resolved input carries s1's output.
    let b_calls = h.runner.calls_for("B");
    assert_eq!(b_calls, vec![json!({"prev": "ok-A"})]);
}

#[tokio::test]
async fn steps_run_in_declaration_order() {
    let h = harness();
    h.engine.registry().insert(definition(
        "ordered",
        vec![
            task("first", "OP_1", json!({})),
            task("second", "OP_2", json!({})),
            task("third", "OP_3", json!({})),
        ],
    ));
    for op in ["OP_1", "OP_2", "OP_3"] {
        h.runner.answer(op, json!({}));
    }

    let execution = h.engine.start_workflow("ordered", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let ops: Vec<String> = h.runner.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops, vec!["OP_1", "OP_2", "OP_3"]);
}

#[tokio::test]
async fn retries_honor_the_cap_and_record_the_counter() {
    let h = harness();
    let mut step = task("flaky", "F", json!({}));
    step.retry = RetryPolicy { max_attempts: 3, backoff_ms: 1 };
    h.engine.registry().insert(definition("retrying", vec![step]));

    let mut failures_left = 2;
    h.runner.script("F", move |_| {
        if failures_left > 0 {
            failures_left -= 1;
            Err(Fault::engine_error("transient"))
        } else {
            Ok(json!({"ok": true}))
        }
    });

    let execution = h.engine.start_workflow("retrying", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(steps[0].retry_count, 2);
    assert_eq!(h.runner.calls_for("F").len(), 3);
}

#[tokio::test]
async fn skip_policy_records_error_and_proceeds() {
    let h = harness();
    let mut brittle = task("brittle", "BAD", json!({}));
    brittle.on_failure = OnFailure::Skip;
    h.engine.registry().insert(definition(
        "skipping",
        vec![brittle, task("after", "GOOD", json!({}))],
    ));
    h.runner.fail_with("BAD", Fault::engine_error("no such template"));
    h.runner.answer("GOOD", json!({}));

    let execution = h.engine.start_workflow("skipping", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps[0].status, StepStatus::Skipped);
    assert_eq!(steps[0].error_message.as_deref(), Some("no such template"));
    assert_eq!(steps[1].status, StepStatus::Completed);
}

#[tokio::test]
async fn fail_policy_halts_without_running_later_steps() {
    let h = harness();
    h.engine.registry().insert(definition(
        "halting",
        vec![task("doomed", "BAD", json!({})), task("never", "NEVER", json!({}))],
    ));
    h.runner.fail_with("BAD", Fault::engine_error("exploded"));
    h.runner.answer("NEVER", json!({}));

    let execution = h.engine.start_workflow("halting", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Failed).await;

    let record = h.store.execution_by_id(execution.as_str()).unwrap();
    assert_eq!(record.error_message.as_deref(), Some("exploded"));
    assert!(h.runner.calls_for("NEVER").is_empty());

    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn unknown_workflow_is_a_not_found_fault() {
    let h = harness();
    let err = h.engine.start_workflow("ghost", json!({})).unwrap_err();
    assert_eq!(err.code, ErrorCode::WorkflowNotFound);
}

#[tokio::test]
async fn initial_context_is_visible_to_templates() {
    let h = harness();
    h.engine.registry().insert(definition(
        "ctx",
        vec![task("s", "OP", json!({"client": "${initial.client}", "missing": "${initial.nope}"}))],
    ));
    h.runner.answer("OP", json!({}));

    let execution = h.engine.start_workflow("ctx", json!({"client": "Acme"})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    assert_eq!(h.runner.calls_for("OP"), vec![json!({"client": "Acme", "missing": null})]);
}
