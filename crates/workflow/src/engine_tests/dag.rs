// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::{ErrorCode, Fault};
use clerk_storage::StepStatus;
use serde_json::json;

fn diamond(max_parallelism: Option<usize>) -> WorkflowDefinition {
    let mut def = definition(
        "diamond",
        vec![
            task("load", "LOAD", json!({})),
            with_deps(task("a", "A", json!({"rows": "${load.rows}"})), &["load"]),
            with_deps(task("b", "B", json!({})), &["load"]),
            with_deps(task("c", "C", json!({})), &["load"]),
            with_deps(
                task("merge", "MERGE", json!({"a": "${a.out}", "b": "${b.out}", "c": "${c.out}"})),
                &["a", "b", "c"],
            ),
        ],
    );
    def.max_parallelism = max_parallelism;
    def
}

#[tokio::test]
async fn diamond_runs_fanout_between_load_and_merge() {
    let h = harness();
    h.engine.registry().insert(diamond(Some(3)));
    h.runner.answer("LOAD", json!({"rows": [1, 2]}));
    for (op, out) in [("A", "a-out"), ("B", "b-out"), ("C", "c-out")] {
        h.runner.answer(op, json!({"out": out}));
    }
    h.runner.answer("MERGE", json!({"merged": true}));

    let execution = h.engine.start_workflow("diamond", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let ops: Vec<String> = h.runner.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops.first().map(String::as_str), Some("LOAD"));
    assert_eq!(ops.last().map(String::as_str), Some("MERGE"));
    assert_eq!(ops.len(), 5);

    // Merge sees every branch result.
    assert_eq!(
        h.runner.calls_for("MERGE"),
        vec![json!({"a": "a-out", "b": "b-out", "c": "c-out"})]
    );
    // A's template resolved against load's persisted result.
    assert_eq!(h.runner.calls_for("A"), vec![json!({"rows": [1, 2]})]);

    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps.len(), 5);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn max_parallelism_one_matches_topological_declaration_order() {
    let h = harness();
    h.engine.registry().insert(diamond(Some(1)));
    h.runner.answer("LOAD", json!({"rows": []}));
    for op in ["A", "B", "C"] {
        h.runner.answer(op, json!({"out": op}));
    }
    h.runner.answer("MERGE", json!({}));

    let execution = h.engine.start_workflow("diamond", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    let ops: Vec<String> = h.runner.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops, vec!["LOAD", "A", "B", "C", "MERGE"]);
}

#[tokio::test]
async fn hard_failure_cascades_to_transitive_dependents() {
    let h = harness();
    h.engine.registry().insert(definition(
        "cascading",
        vec![
            task("load", "LOAD", json!({})),
            with_deps(task("a", "A", json!({})), &["load"]),
            with_deps(task("b", "B", json!({})), &["a"]),
            with_deps(task("side", "SIDE", json!({})), &["load"]),
        ],
    ));
    h.runner.answer("LOAD", json!({}));
    h.runner.fail_with("A", Fault::engine_error("worker exploded"));
    h.runner.answer("B", json!({}));
    h.runner.answer("SIDE", json!({}));

    let execution = h.engine.start_workflow("cascading", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Failed).await;

    // b was condemned without ever dispatching.
    assert!(h.runner.calls_for("B").is_empty());
    let steps = h.store.steps_for_execution(execution.as_str());
    let b_row = steps.iter().find(|s| s.step_id == "b").unwrap();
    assert_eq!(b_row.status, StepStatus::Failed);
    assert_eq!(b_row.error_message.as_deref(), Some("upstream step 'a' failed"));
}

#[tokio::test]
async fn skip_policy_satisfies_dependents_in_a_dag() {
    let h = harness();
    let mut brittle = with_deps(task("enrich", "ENRICH", json!({})), &["load"]);
    brittle.on_failure = OnFailure::Skip;
    h.engine.registry().insert(definition(
        "tolerant",
        vec![
            task("load", "LOAD", json!({})),
            brittle,
            with_deps(task("save", "SAVE", json!({"extra": "${enrich.out}"})), &["enrich"]),
        ],
    ));
    h.runner.answer("LOAD", json!({}));
    h.runner.fail_with("ENRICH", Fault::timeout("slow worker"));
    h.runner.answer("SAVE", json!({}));

    let execution = h.engine.start_workflow("tolerant", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    // The skipped step produced no result, so the reference resolves null.
    assert_eq!(h.runner.calls_for("SAVE"), vec![json!({"extra": null})]);
    let steps = h.store.steps_for_execution(execution.as_str());
    assert_eq!(steps.iter().find(|s| s.step_id == "enrich").unwrap().status, StepStatus::Skipped);
}

#[tokio::test]
async fn invalid_graph_is_rejected_at_start() {
    let h = harness();
    h.engine.registry().insert(definition(
        "cyclic",
        vec![
            with_deps(task("a", "A", json!({})), &["b"]),
            with_deps(task("b", "B", json!({})), &["a"]),
        ],
    ));
    let err = h.engine.start_workflow("cyclic", json!({})).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    // Nothing persisted for a rejected start.
    assert!(h.store.recent_executions(10).is_empty());
}
