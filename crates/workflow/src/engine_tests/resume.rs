// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume-after-restart: completed steps keep their results and never
//! re-run; interrupted steps re-enter from their start.

use super::*;
use clerk_storage::StepStatus;
use serde_json::json;

fn diamond() -> WorkflowDefinition {
    definition(
        "diamond",
        vec![
            task("load", "LOAD", json!({})),
            with_deps(task("a", "A", json!({})), &["load"]),
            with_deps(task("b", "B", json!({})), &["load"]),
            with_deps(
                task("merge", "MERGE", json!({"a": "${a.out}", "b": "${b.out}"})),
                &["a", "b"],
            ),
        ],
    )
}

/// Persist the picture a crash would leave behind: execution running,
/// load + a completed, b caught mid-run, merge never started.
fn seed_crashed_diamond(h: &Harness) -> String {
    let execution_id = "wfx-crashed".to_string();
    h.store.execution_insert(&execution_id, "diamond", &json!({}), 100);
    h.store.step_begin(&execution_id, "load", "task", 0, 110);
    h.store.step_finish(&execution_id, "load", StepStatus::Completed, Some(&json!({"rows": 2})), None, 120);
    h.store.step_begin(&execution_id, "a", "task", 0, 130);
    h.store.step_finish(&execution_id, "a", StepStatus::Completed, Some(&json!({"out": "a-out"})), None, 140);
    h.store.step_begin(&execution_id, "b", "task", 0, 130);
    execution_id
}

#[tokio::test]
async fn resume_re_enters_from_the_frontier() {
    let h = harness();
    h.engine.registry().insert(diamond());
    let execution_id = seed_crashed_diamond(&h);

    let restarted = restarted(&h);
    restarted.runner.answer("LOAD", json!({"rows": 99}));
    restarted.runner.answer("A", json!({"out": "fresh-a"}));
    restarted.runner.answer("B", json!({"out": "b-out"}));
    restarted.runner.answer("MERGE", json!({"merged": true}));

    assert_eq!(restarted.engine.resume_in_progress(), 1);
    wait_for_status(&restarted.store, &execution_id, ExecutionStatus::Completed).await;

    // Completed steps did not re-execute.
    assert!(restarted.runner.calls_for("LOAD").is_empty());
    assert!(restarted.runner.calls_for("A").is_empty());
    // The interrupted step re-entered from its start.
    assert_eq!(restarted.runner.calls_for("B").len(), 1);
    // Merge resolved against the persisted result of `a`, not a re-run.
    assert_eq!(
        restarted.runner.calls_for("MERGE"),
        vec![json!({"a": "a-out", "b": "b-out"})]
    );

    let steps = restarted.store.steps_for_execution(&execution_id);
    assert_eq!(steps.len(), 4);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    // load kept its pre-crash result.
    let load = steps.iter().find(|s| s.step_id == "load").unwrap();
    assert_eq!(load.result, Some(json!({"rows": 2})));
}

#[tokio::test]
async fn resume_leaves_pending_approvals_parked() {
    let h = harness();
    h.engine.registry().insert(definition(
        "gated",
        vec![approval("gate", "Go?"), task("after", "AFTER", json!({}))],
    ));
    let execution_id = "wfx-parked".to_string();
    h.store.execution_insert(&execution_id, "gated", &json!({}), 100);
    h.store.step_begin(&execution_id, "gate", "approval", 0, 110);
    h.store.approval_insert(&execution_id, "gate", "Go?", &["APPROVE".to_string(), "REJECT".to_string()], 110);
    h.store.execution_set_status(&execution_id, ExecutionStatus::PausedForApproval, None, None);

    let restarted = restarted(&h);
    restarted.runner.answer("AFTER", json!({}));
    assert_eq!(restarted.engine.resume_in_progress(), 1);

    // Still parked: approvals survive restarts unresolved.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        restarted.store.execution_by_id(&execution_id).unwrap().status,
        ExecutionStatus::PausedForApproval
    );
    assert_eq!(restarted.engine.list_pending_approvals().len(), 1);

    restarted.engine.resolve_approval(&execution_id, "gate", "APPROVE", "erika", None).unwrap();
    wait_for_status(&restarted.store, &execution_id, ExecutionStatus::Completed).await;
    assert_eq!(restarted.runner.calls_for("AFTER").len(), 1);
}

#[tokio::test]
async fn decision_persisted_before_crash_is_applied_on_resume() {
    let h = harness();
    h.engine.registry().insert(definition(
        "gated",
        vec![approval("gate", "Go?"), task("after", "AFTER", json!({}))],
    ));
    // The approval was resolved, but the process died before the step
    // transition landed.
    let execution_id = "wfx-resolved".to_string();
    h.store.execution_insert(&execution_id, "gated", &json!({}), 100);
    h.store.step_begin(&execution_id, "gate", "approval", 0, 110);
    h.store.approval_insert(&execution_id, "gate", "Go?", &["APPROVE".to_string()], 110);
    h.store.approval_resolve(&execution_id, "gate", "APPROVE", "erika", None, 120);
    h.store.execution_set_status(&execution_id, ExecutionStatus::PausedForApproval, None, None);

    let restarted = restarted(&h);
    restarted.runner.answer("AFTER", json!({}));
    assert_eq!(restarted.engine.resume_in_progress(), 1);
    wait_for_status(&restarted.store, &execution_id, ExecutionStatus::Completed).await;

    // The stored decision carried the workflow through without waiting.
    assert_eq!(restarted.runner.calls_for("AFTER").len(), 1);
    assert!(restarted.engine.list_pending_approvals().is_empty());
}

#[tokio::test]
async fn resume_without_definition_fails_the_execution() {
    let h = harness();
    h.store.execution_insert("wfx-orphan", "deleted-workflow", &json!({}), 100);

    let restarted = restarted(&h);
    assert_eq!(restarted.engine.resume_in_progress(), 0);

    let record = restarted.store.execution_by_id("wfx-orphan").unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("workflow definition missing at restart"));
}

#[tokio::test]
async fn resume_after_step_failure_finishes_the_failure() {
    let h = harness();
    h.engine.registry().insert(definition(
        "mid-failure",
        vec![task("s1", "OP", json!({})), task("s2", "OP2", json!({}))],
    ));
    // Crash happened after the step failed but before the execution row
    // was transitioned.
    h.store.execution_insert("wfx-mid", "mid-failure", &json!({}), 100);
    h.store.step_begin("wfx-mid", "s1", "task", 0, 110);
    h.store.step_finish("wfx-mid", "s1", StepStatus::Failed, None, Some("boom"), 120);

    let restarted = restarted(&h);
    restarted.runner.answer("OP2", json!({}));
    restarted.engine.resume_in_progress();
    wait_for_status(&restarted.store, "wfx-mid", ExecutionStatus::Failed).await;
    assert!(restarted.runner.calls_for("OP2").is_empty());
}

#[tokio::test]
async fn terminal_executions_are_not_resumed() {
    let h = harness();
    h.engine.registry().insert(diamond());
    h.store.execution_insert("wfx-done", "diamond", &json!({}), 100);
    h.store.execution_set_status("wfx-done", ExecutionStatus::Completed, None, Some(200));

    let restarted = restarted(&h);
    assert_eq!(restarted.engine.resume_in_progress(), 0);
    assert!(restarted.runner.calls().is_empty());
}
