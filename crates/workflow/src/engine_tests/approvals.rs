// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::engine::ApprovalDecision;
use clerk_core::ErrorCode;
use clerk_storage::StepStatus;
use serde_json::json;

fn gated_definition() -> WorkflowDefinition {
    definition(
        "gated",
        vec![
            task("prepare", "PREP", json!({})),
            approval("gate", "Ship the export?"),
            task("ship", "SHIP", json!({"approved_by": "${gate.actor}"})),
        ],
    )
}

#[tokio::test]
async fn approval_parks_then_approve_resumes() {
    let h = harness();
    h.engine.registry().insert(gated_definition());
    h.runner.answer("PREP", json!({}));
    h.runner.answer("SHIP", json!({}));

    let execution = h.engine.start_workflow("gated", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::PausedForApproval).await;

    let pending = h.engine.list_pending_approvals();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].step_id, "gate");
    assert_eq!(pending[0].prompt, "Ship the export?");
    assert!(h.runner.calls_for("SHIP").is_empty());

    h.engine
        .resolve_approval(execution.as_str(), "gate", "APPROVE", "erika", Some("looks right"))
        .unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Completed).await;

    // The ship step saw the approval result through the template.
    assert_eq!(h.runner.calls_for("SHIP"), vec![json!({"approved_by": "erika"})]);

    let row = h.store.approval_for_step(execution.as_str(), "gate").unwrap();
    assert_eq!(row.decision.as_deref(), Some("APPROVE"));
    assert_eq!(row.actor_id.as_deref(), Some("erika"));
    assert_eq!(row.comment.as_deref(), Some("looks right"));
    assert!(row.resolved_at.is_some());
}

#[tokio::test]
async fn reject_fails_the_workflow_deterministically() {
    let h = harness();
    h.engine.registry().insert(gated_definition());
    h.runner.answer("PREP", json!({}));
    h.runner.answer("SHIP", json!({}));

    let execution = h.engine.start_workflow("gated", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::PausedForApproval).await;

    h.engine.resolve_approval(execution.as_str(), "gate", "REJECT", "erika", None).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Failed).await;

    assert!(h.runner.calls_for("SHIP").is_empty());
    let steps = h.store.steps_for_execution(execution.as_str());
    let gate = steps.iter().find(|s| s.step_id == "gate").unwrap();
    assert_eq!(gate.status, StepStatus::Failed);
    assert_eq!(gate.error_message.as_deref(), Some("rejected by erika"));

    let row = h.store.approval_for_step(execution.as_str(), "gate").unwrap();
    assert_eq!(row.decision.as_deref(), Some("REJECT"));
}

#[tokio::test]
async fn resolution_is_idempotent() {
    let h = harness();
    h.engine.registry().insert(gated_definition());
    h.runner.answer("PREP", json!({}));
    h.runner.answer("SHIP", json!({}));

    let execution = h.engine.start_workflow("gated", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::PausedForApproval).await;

    h.engine.resolve_approval(execution.as_str(), "gate", "APPROVE", "erika", None).unwrap();
    let err = h
        .engine
        .resolve_approval(execution.as_str(), "gate", "REJECT", "mallory", None)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ApprovalAlreadyResolved);

    // First resolution stands.
    let row = h.store.approval_for_step(execution.as_str(), "gate").unwrap();
    assert_eq!(row.decision.as_deref(), Some("APPROVE"));
    assert_eq!(row.actor_id.as_deref(), Some("erika"));
}

#[tokio::test]
async fn disallowed_decision_word_is_rejected() {
    let h = harness();
    h.engine.registry().insert(gated_definition());
    h.runner.answer("PREP", json!({}));

    let execution = h.engine.start_workflow("gated", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::PausedForApproval).await;

    let err =
        h.engine.resolve_approval(execution.as_str(), "gate", "MAYBE", "erika", None).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    // Still pending.
    assert_eq!(h.engine.list_pending_approvals().len(), 1);
}

#[tokio::test]
async fn resolving_a_missing_approval_is_not_found() {
    let h = harness();
    let err = h.engine.resolve_approval("wfx-ghost", "gate", "APPROVE", "a", None).unwrap_err();
    assert_eq!(err.code, ErrorCode::ApprovalNotFound);
}

#[tokio::test]
async fn pending_list_excludes_finished_executions() {
    let h = harness();
    h.engine.registry().insert(gated_definition());
    h.runner.answer("PREP", json!({}));
    h.runner.answer("SHIP", json!({}));

    let execution = h.engine.start_workflow("gated", json!({})).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::PausedForApproval).await;
    h.engine.resolve_approval(execution.as_str(), "gate", "REJECT", "erika", None).unwrap();
    wait_for_status(&h.store, execution.as_str(), ExecutionStatus::Failed).await;

    assert!(h.engine.list_pending_approvals().is_empty());
}

#[yare::parameterized(
    approve_word   = { "APPROVE", ApprovalDecision::Approve },
    lowercase_ok   = { "approve", ApprovalDecision::Approve },
    custom_word    = { "SIGN_OFF", ApprovalDecision::Approve },
    reject_word    = { "REJECT", ApprovalDecision::Reject },
    deny_word      = { "deny", ApprovalDecision::Reject },
    decline_word   = { "Decline", ApprovalDecision::Reject },
)]
fn decision_words_classify(word: &str, expected: ApprovalDecision) {
    assert_eq!(ApprovalDecision::classify(word), expected);
}
