// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The analytic rules behind `GET_AI_SUGGESTIONS`.
//!
//! Each rule reads persisted aggregates and the loaded definitions and
//! yields suggestions with an explanation and explicit limitations.
//! Nothing here mutates anything.

use clerk_storage::Store;
use clerk_workflow::{StepKind, WorkflowRegistry};

use crate::suggestion::{Explanation, Limitations, Suggestion, SuggestionType};

const FAILURE_RATE_FLOOR: f64 = 0.3;
const MIN_ATTEMPTS: u64 = 3;
const SLOW_STEP_MS: f64 = 60_000.0;
const APPROVAL_STALE_MS: u64 = 60 * 60 * 1000;
const RELIABILITY_FLOOR: f64 = 0.5;
const MIN_EXECUTIONS: u64 = 4;

pub(crate) fn analyze(store: &Store, registry: &WorkflowRegistry, now_ms: u64) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    suggestions.extend(retry_policy_rule(store, registry));
    suggestions.extend(slow_step_rule(store));
    suggestions.extend(approval_bottleneck_rule(store, now_ms));
    suggestions.extend(unused_workflow_rule(store, registry));
    suggestions.extend(reliability_rule(store));
    suggestions
}

/// Steps that fail often but declare no retries.
fn retry_policy_rule(store: &Store, registry: &WorkflowRegistry) -> Vec<Suggestion> {
    store
        .step_failure_stats()
        .into_iter()
        .filter(|stat| stat.attempts >= MIN_ATTEMPTS)
        .filter_map(|stat| {
            let rate = stat.failures as f64 / stat.attempts as f64;
            if rate < FAILURE_RATE_FLOOR {
                return None;
            }
            let def = registry.get(&stat.workflow_id)?;
            let step = def.step(&stat.step_id)?;
            if !matches!(step.kind, StepKind::Task { .. }) || step.retry.max_attempts > 1 {
                return None;
            }
            let confidence = (0.4 + rate * 0.5).min(0.95);
            Some(
                Suggestion::new(
                    SuggestionType::RetryPolicy,
                    format!("workflow:{}", stat.workflow_id),
                    format!("Add a retry policy to step '{}'", stat.step_id),
                    format!(
                        "Step '{}' of workflow '{}' failed {} of {} recorded runs and has no \
                         retry policy. Transient worker errors would be absorbed by 2-3 attempts \
                         with a short backoff.",
                        stat.step_id, stat.workflow_id, stat.failures, stat.attempts
                    ),
                    confidence,
                    Explanation {
                        summary: "High failure rate on a step without retries".to_string(),
                        reasoning: vec![
                            format!("observed failure rate {:.0}%", rate * 100.0),
                            "step declares max_attempts = 1".to_string(),
                        ],
                        evidence: vec![format!(
                            "workflow_step_execution: {} failures / {} attempts for step '{}'",
                            stat.failures, stat.attempts, stat.step_id
                        )],
                    },
                )
                .with_limitations(Limitations {
                    assumptions: vec!["failures are transient rather than structural".to_string()],
                    missing_data: vec!["error categories are not broken out per failure".to_string()],
                }),
            )
        })
        .collect()
}

/// Steps whose average duration is long enough to deserve a bound.
fn slow_step_rule(store: &Store) -> Vec<Suggestion> {
    store
        .step_duration_stats()
        .into_iter()
        .filter(|stat| stat.avg_ms > SLOW_STEP_MS && stat.runs >= 2)
        .map(|stat| {
            let confidence = (0.5 + (stat.avg_ms / SLOW_STEP_MS - 1.0) * 0.1).min(0.9);
            Suggestion::new(
                SuggestionType::StepTimeout,
                format!("workflow:{}", stat.workflow_id),
                format!("Step '{}' runs long", stat.step_id),
                format!(
                    "Step '{}' averages {:.1} s over {} completed runs. A per-step deadline \
                     would stop a wedged worker from holding the execution open.",
                    stat.step_id,
                    stat.avg_ms / 1000.0,
                    stat.runs
                ),
                confidence,
                Explanation {
                    summary: "Average step duration exceeds a minute".to_string(),
                    reasoning: vec![format!("average duration {:.0} ms", stat.avg_ms)],
                    evidence: vec![format!(
                        "workflow_step_execution: {} completed runs of '{}'",
                        stat.runs, stat.step_id
                    )],
                },
            )
        })
        .collect()
}

/// Approvals that have been waiting for longer than an hour.
fn approval_bottleneck_rule(store: &Store, now_ms: u64) -> Vec<Suggestion> {
    store
        .pending_approvals()
        .into_iter()
        .filter(|approval| now_ms.saturating_sub(approval.requested_at) > APPROVAL_STALE_MS)
        .map(|approval| {
            let waited_min = now_ms.saturating_sub(approval.requested_at) / 60_000;
            Suggestion::new(
                SuggestionType::ApprovalBottleneck,
                format!("execution:{}", approval.execution_id),
                format!("Approval '{}' has waited {waited_min} min", approval.step_id),
                format!(
                    "Execution '{}' has been paused on approval step '{}' for {waited_min} \
                     minutes. Consider resolving it or notifying the approver.",
                    approval.execution_id, approval.step_id
                ),
                0.85,
                Explanation {
                    summary: "Stale pending approval".to_string(),
                    reasoning: vec![format!("requested_at is {waited_min} minutes ago")],
                    evidence: vec![format!(
                        "workflow_approval: execution '{}', step '{}', decision NULL",
                        approval.execution_id, approval.step_id
                    )],
                },
            )
        })
        .collect()
}

/// Loaded definitions that have never been executed.
fn unused_workflow_rule(store: &Store, registry: &WorkflowRegistry) -> Vec<Suggestion> {
    let counts = store.execution_counts();
    registry
        .ids()
        .into_iter()
        .filter(|id| !counts.iter().any(|c| &c.workflow_id == id))
        .map(|id| {
            Suggestion::new(
                SuggestionType::UnusedWorkflow,
                format!("workflow:{id}"),
                format!("Workflow '{id}' has never run"),
                format!(
                    "Definition '{id}' is loaded but has no recorded executions. It may be \
                     obsolete, or it may be missing a trigger registration."
                ),
                0.35,
                Explanation {
                    summary: "Loaded definition with zero executions".to_string(),
                    reasoning: vec!["no workflow_execution rows reference it".to_string()],
                    evidence: vec![format!("workflow_execution: 0 rows for '{id}'")],
                },
            )
            .with_limitations(Limitations {
                assumptions: vec!["execution history has not been pruned recently".to_string()],
                missing_data: vec!["definition age is unknown".to_string()],
            })
        })
        .collect()
}

/// Workflows that fail more often than they complete.
fn reliability_rule(store: &Store) -> Vec<Suggestion> {
    store
        .execution_counts()
        .into_iter()
        .filter(|stat| stat.total >= MIN_EXECUTIONS)
        .filter_map(|stat| {
            let rate = stat.failed as f64 / stat.total as f64;
            if rate < RELIABILITY_FLOOR {
                return None;
            }
            Some(Suggestion::new(
                SuggestionType::WorkflowReliability,
                format!("workflow:{}", stat.workflow_id),
                format!("Workflow '{}' fails more than it completes", stat.workflow_id),
                format!(
                    "{} of {} executions of '{}' failed. Inspect the failing step's error \
                     messages in the execution history.",
                    stat.failed, stat.total, stat.workflow_id
                ),
                (0.4 + rate * 0.4).min(0.9),
                Explanation {
                    summary: "Majority of executions fail".to_string(),
                    reasoning: vec![format!("failure rate {:.0}%", rate * 100.0)],
                    evidence: vec![format!(
                        "workflow_execution: {} failed / {} total for '{}'",
                        stat.failed, stat.total, stat.workflow_id
                    )],
                },
            ))
        })
        .collect()
}
