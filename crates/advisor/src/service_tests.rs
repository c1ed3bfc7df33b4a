// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::guardrail::GuardrailPolicy;
use crate::suggestion::SuggestionType;
use clerk_core::FakeClock;
use clerk_storage::StepStatus;
use clerk_workflow::WorkflowDefinition;
use serde_json::json;

fn service_with(policy: GuardrailPolicy) -> AdvisorService<FakeClock> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let registry = Arc::new(WorkflowRegistry::new());
    AdvisorService::new(store, registry, Guardrail::new(policy), FakeClock::at(10_000))
}

fn seed_flaky_step(service: &AdvisorService<FakeClock>) {
    let def = WorkflowDefinition::from_json(
        r#"{"id": "w", "steps": [{"id": "flaky", "type": "task", "operation": "OP"}]}"#,
    )
    .unwrap();
    service.registry.insert(def);
    for (i, ok) in [false, false, true].iter().enumerate() {
        let exec = format!("wfx-{i}");
        service.store.execution_insert(&exec, "w", &json!({}), 1);
        service.store.step_begin(&exec, "flaky", "task", 0, 1);
        if *ok {
            service.store.step_finish(&exec, "flaky", StepStatus::Completed, Some(&json!(1)), None, 2);
        } else {
            service.store.step_finish(&exec, "flaky", StepStatus::Failed, None, Some("x"), 2);
        }
    }
}

#[test]
fn allowed_suggestion_passes_with_audit_trail() {
    let service = service_with(GuardrailPolicy::default());
    seed_flaky_step(&service);

    let suggestions = service.suggestions(Some("workflow:w"));
    assert_eq!(suggestions.len(), 1);
    let suggestion = &suggestions[0];
    assert_eq!(suggestion.suggestion_type, SuggestionType::RetryPolicy);
    assert!(suggestion.flag.is_none());
    assert!(suggestion.confidence >= 0.4);
    assert!(!suggestion.explanation.evidence.is_empty());

    // Invariant: audit rows exist and the guardrail row is consistent.
    let audits = service.store.suggestion_audits(Some("workflow:w"), 10);
    assert_eq!(audits.len(), 1);
    let verdicts = service.store.guardrail_audits_for(suggestion.id.as_str());
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].decision, "allow");
}

#[test]
fn blocked_suggestion_is_absent_but_audited() {
    let service = service_with(GuardrailPolicy {
        blocked_types: vec!["retry_policy".to_string()],
        ..GuardrailPolicy::default()
    });
    seed_flaky_step(&service);

    let suggestions = service.suggestions(Some("workflow:w"));
    assert!(suggestions.is_empty());

    // The computed suggestion and the block verdict are still on record.
    let audits = service.store.suggestion_audits(Some("workflow:w"), 10);
    assert_eq!(audits.len(), 1);
    let verdicts = service.store.guardrail_audits_for(&audits[0].suggestion_id);
    assert_eq!(verdicts[0].decision, "block");
}

#[test]
fn low_confidence_suggestion_is_flagged() {
    let service = service_with(GuardrailPolicy {
        min_confidence: 0.99,
        ..GuardrailPolicy::default()
    });
    seed_flaky_step(&service);

    let suggestions = service.suggestions(Some("workflow:w"));
    assert_eq!(suggestions.len(), 1);
    let reason = suggestions[0].flag.as_deref().unwrap();
    assert!(reason.contains("below threshold"));

    let audits = service.store.suggestion_audits(None, 10);
    let verdicts = service.store.guardrail_audits_for(&audits[0].suggestion_id);
    assert_eq!(verdicts[0].decision, "flag");
}

#[test]
fn context_cap_limits_returned_suggestions() {
    let service = service_with(GuardrailPolicy { max_per_context: 1, ..GuardrailPolicy::default() });
    // Two rules fire for the same workflow context: flaky step + reliability.
    seed_flaky_step(&service);
    service.store.execution_insert("wfx-x", "w", &json!({}), 1);
    for i in 0..4 {
        let exec = format!("wfx-r{i}");
        service.store.execution_insert(&exec, "w", &json!({}), 1);
        service.store.execution_set_status(
            &exec,
            clerk_storage::ExecutionStatus::Failed,
            Some("x"),
            Some(2),
        );
    }

    let suggestions = service.suggestions(Some("workflow:w"));
    assert_eq!(suggestions.len(), 1);
}

#[test]
fn draft_generation_audits_and_hashes() {
    let service = service_with(GuardrailPolicy::default());
    let draft = service
        .generate_draft(DraftKind::WorkflowSkeleton, &json!({"workflow_id": "invoice-export"}))
        .unwrap();
    assert_eq!(draft.status, "draft-only");
    assert_eq!(draft.content["id"], "invoice-export");

    let audits = service.store.draft_audits(10);
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, "draft-only");
    assert_eq!(audits[0].content_hash, draft.content_hash);
}

#[test]
fn blocked_draft_kind_surfaces_policy_blocked() {
    let service = service_with(GuardrailPolicy {
        blocked_types: vec!["policy_config".to_string()],
        ..GuardrailPolicy::default()
    });
    let err = service.generate_draft(DraftKind::PolicyConfig, &json!({})).unwrap_err();
    assert_eq!(err.code, ErrorCode::PolicyBlocked);
    // The attempt is audited even though nothing was returned.
    assert_eq!(service.store.draft_audits(10).len(), 1);
}

#[test]
fn quiet_history_produces_no_suggestions() {
    let service = service_with(GuardrailPolicy::default());
    assert!(service.suggestions(None).is_empty());
    assert!(service.store.suggestion_audits(None, 10).is_empty());
}
