// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution driver.
//!
//! One driver task owns scheduling for an execution at a time (the
//! `driving` flag). It starts every ready step up to the parallelism cap,
//! awaits completions, and finalizes the execution when nothing is left to
//! run. Approval steps park; the driver returns and `resolve_approval`
//! re-enters.

use std::sync::Arc;
use std::time::Duration;

use clerk_core::{Clock, Fault};
use clerk_storage::{ExecutionStatus, StepStatus, Store};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::state::{downstream, LiveExecution, StepState};
use super::WorkflowEngine;
use crate::definition::{OnFailure, StepDefinition, StepKind};
use crate::runner::StepRunner;
use crate::template::{resolve_template, TemplateContext};

struct StepOutcome {
    step_id: String,
    result: Result<Value, Fault>,
}

enum Ready {
    Task { step: StepDefinition, input: Value },
    Approval { step: StepDefinition },
}

impl<C: Clock> WorkflowEngine<C> {
    pub(super) fn spawn_driver(&self, live: Arc<LiveExecution>) {
        let Some(engine) = self.this.upgrade() else { return };
        tokio::spawn(async move {
            engine.drive(live).await;
        });
    }

    async fn drive(self: Arc<Self>, live: Arc<LiveExecution>) {
        {
            let mut state = live.state.lock();
            if state.driving {
                return;
            }
            state.driving = true;
        }

        let mut inflight: JoinSet<StepOutcome> = JoinSet::new();
        loop {
            self.schedule_ready(&live, &mut inflight);

            if inflight.is_empty() {
                // The park/finalize decision and the driving-flag handoff
                // must be atomic: resolve_approval mutates the same state
                // and spawns a new driver only when no driver holds the
                // flag.
                enum Next {
                    Reschedule,
                    Park,
                    Finalize,
                }
                let next = {
                    let mut state = live.state.lock();
                    let has_ready = state.failing.is_none()
                        && live.def.steps.iter().any(|s| {
                            state.steps.get(&s.id) == Some(&StepState::Pending)
                                && state.indegree.get(&s.id).copied().unwrap_or(0) == 0
                        });
                    if has_ready {
                        Next::Reschedule
                    } else if state.failing.is_none()
                        && state.steps.values().any(|s| *s == StepState::AwaitingApproval)
                    {
                        state.driving = false;
                        Next::Park
                    } else {
                        Next::Finalize
                    }
                };
                match next {
                    Next::Reschedule => continue,
                    // Wait for a human; resolve_approval re-enters.
                    Next::Park => return,
                    Next::Finalize => {
                        self.finalize(&live);
                        live.state.lock().driving = false;
                        return;
                    }
                }
            }

            match inflight.join_next().await {
                Some(Ok(outcome)) => self.apply_outcome(&live, outcome),
                Some(Err(join_error)) => {
                    error!(execution = %live.execution_id, error = %join_error, "step task aborted");
                    let mut state = live.state.lock();
                    state.running = state.running.saturating_sub(1);
                    state.failing = Some(format!("step task aborted: {join_error}"));
                }
                None => {}
            }
        }
    }

    /// Start every runnable step, in declaration order, up to the cap.
    fn schedule_ready(&self, live: &Arc<LiveExecution>, inflight: &mut JoinSet<StepOutcome>) {
        loop {
            let ready = {
                let mut state = live.state.lock();
                if state.failing.is_some() {
                    None
                } else if state.running >= live.def.max_parallelism.unwrap_or(usize::MAX) {
                    None
                } else {
                    let next = live
                        .def
                        .steps
                        .iter()
                        .find(|s| {
                            state.steps.get(&s.id) == Some(&StepState::Pending)
                                && state.indegree.get(&s.id).copied().unwrap_or(0) == 0
                        })
                        .cloned();
                    match next {
                        None => None,
                        Some(step) => match &step.kind {
                            StepKind::Task { input, .. } => {
                                state.steps.insert(step.id.clone(), StepState::Running);
                                state.running += 1;
                                let ctx = TemplateContext {
                                    initial: &state.initial,
                                    results: &state.results,
                                    variables: &live.def.variables,
                                };
                                let resolved = resolve_template(input, &ctx);
                                Some(Ready::Task { step: step.clone(), input: resolved })
                            }
                            StepKind::Approval { .. } => {
                                state.steps.insert(step.id.clone(), StepState::AwaitingApproval);
                                Some(Ready::Approval { step: step.clone() })
                            }
                        },
                    }
                }
            };

            let execution_id = live.execution_id.as_str();
            match ready {
                None => return,
                Some(Ready::Task { step, input }) => {
                    let now = self.clock.epoch_ms();
                    self.store.step_begin(execution_id, &step.id, step.kind.name(), 0, now);
                    self.bus.publish(
                        "workflow.step.started",
                        json!({"execution_id": execution_id, "step_id": step.id.clone()}),
                    );
                    let runner = Arc::clone(&self.runner);
                    let store = Arc::clone(&self.store);
                    let execution = execution_id.to_string();
                    inflight.spawn(run_task(runner, store, execution, step, input));
                }
                Some(Ready::Approval { step }) => {
                    let now = self.clock.epoch_ms();
                    let (prompt, allowed) = match &step.kind {
                        StepKind::Approval { prompt, allowed_decisions } => {
                            (prompt.clone(), allowed_decisions.clone())
                        }
                        StepKind::Task { .. } => unreachable!("scheduled as approval"),
                    };
                    self.store.step_begin(execution_id, &step.id, step.kind.name(), 0, now);
                    self.store.approval_insert(execution_id, &step.id, &prompt, &allowed, now);

                    // A crash can leave a resolved approval behind a step
                    // still marked running; apply the stored decision
                    // instead of waiting for one that already happened.
                    let existing = self.store.approval_for_step(execution_id, &step.id);
                    if let Some(row) = existing {
                        if let Some(decision) = row.decision {
                            let class = super::ApprovalDecision::classify(&decision);
                            self.apply_approval_outcome(
                                live,
                                &step.id,
                                class,
                                &decision,
                                row.actor_id.as_deref().unwrap_or("unknown"),
                                row.comment.as_deref(),
                                now,
                            );
                            continue;
                        }
                    }

                    self.store.execution_set_status(
                        execution_id,
                        ExecutionStatus::PausedForApproval,
                        None,
                        None,
                    );
                    self.bus.publish(
                        "workflow.approval.requested",
                        json!({
                            "execution_id": execution_id,
                            "step_id": step.id.clone(),
                            "prompt": prompt,
                            "allowed_decisions": allowed,
                        }),
                    );
                    info!(execution = execution_id, step = %step.id, "awaiting approval");
                }
            }
        }
    }

    fn apply_outcome(&self, live: &Arc<LiveExecution>, outcome: StepOutcome) {
        let execution_id = live.execution_id.as_str();
        let now = self.clock.epoch_ms();
        let step_id = outcome.step_id;
        match outcome.result {
            Ok(value) => {
                self.store.step_finish(
                    execution_id,
                    &step_id,
                    StepStatus::Completed,
                    Some(&value),
                    None,
                    now,
                );
                self.bus.publish(
                    "workflow.step.completed",
                    json!({"execution_id": execution_id, "step_id": step_id.clone()}),
                );
                let mut state = live.state.lock();
                state.steps.insert(step_id.clone(), StepState::Completed);
                state.results.insert(step_id.clone(), value);
                state.running = state.running.saturating_sub(1);
                for dependent in live.edges.dependents.get(&step_id).into_iter().flatten() {
                    if let Some(d) = state.indegree.get_mut(dependent) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
            Err(fault) => {
                let on_failure =
                    live.def.step(&step_id).map(|s| s.on_failure).unwrap_or_default();
                match on_failure {
                    OnFailure::Skip => {
                        self.store.step_finish(
                            execution_id,
                            &step_id,
                            StepStatus::Skipped,
                            None,
                            Some(&fault.message),
                            now,
                        );
                        self.bus.publish(
                            "workflow.step.skipped",
                            json!({"execution_id": execution_id, "step_id": step_id.clone(), "error": fault.message}),
                        );
                        let mut state = live.state.lock();
                        state.steps.insert(step_id.clone(), StepState::Skipped);
                        state.running = state.running.saturating_sub(1);
                        for dependent in live.edges.dependents.get(&step_id).into_iter().flatten() {
                            if let Some(d) = state.indegree.get_mut(dependent) {
                                *d = d.saturating_sub(1);
                            }
                        }
                    }
                    OnFailure::Fail => {
                        self.store.step_finish(
                            execution_id,
                            &step_id,
                            StepStatus::Failed,
                            None,
                            Some(&fault.message),
                            now,
                        );
                        self.bus.publish(
                            "workflow.step.failed",
                            json!({"execution_id": execution_id, "step_id": step_id.clone(), "error": fault.message.clone()}),
                        );
                        // Transitive dependents of a hard failure never run.
                        let cascade = if live.def.is_dag() {
                            downstream(&live.edges, &step_id)
                        } else {
                            Vec::new()
                        };
                        let condemned: Vec<String> = {
                            let mut state = live.state.lock();
                            state.steps.insert(step_id.clone(), StepState::Failed);
                            state.running = state.running.saturating_sub(1);
                            state.failing = Some(fault.message.clone());
                            cascade
                                .into_iter()
                                .filter(|id| {
                                    state.steps.get(id) == Some(&StepState::Pending) && {
                                        state.steps.insert(id.clone(), StepState::Failed);
                                        true
                                    }
                                })
                                .collect()
                        };
                        for id in condemned {
                            let error = format!("upstream step '{step_id}' failed");
                            let kind = live.def.step(&id).map(|s| s.kind.name()).unwrap_or("task");
                            self.store.step_begin(execution_id, &id, kind, 0, now);
                            self.store.step_finish(
                                execution_id,
                                &id,
                                StepStatus::Failed,
                                None,
                                Some(&error),
                                now,
                            );
                            self.bus.publish(
                                "workflow.step.failed",
                                json!({"execution_id": execution_id, "step_id": id, "error": error}),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Terminal bookkeeping once nothing is running or schedulable.
    fn finalize(&self, live: &Arc<LiveExecution>) {
        let execution_id = live.execution_id.as_str();
        let now = self.clock.epoch_ms();

        let (failing, parked) = {
            let state = live.state.lock();
            let parked: Vec<String> = state
                .steps
                .iter()
                .filter(|(_, s)| **s == StepState::AwaitingApproval)
                .map(|(id, _)| id.clone())
                .collect();
            (state.failing.clone(), parked)
        };

        if let Some(error) = failing {
            for step_id in parked {
                self.store.step_finish(
                    execution_id,
                    &step_id,
                    StepStatus::Failed,
                    None,
                    Some("workflow failed before approval resolved"),
                    now,
                );
                live.state.lock().steps.insert(step_id, StepState::Failed);
            }
            self.store.execution_set_status(
                execution_id,
                ExecutionStatus::Failed,
                Some(&error),
                Some(now),
            );
            info!(execution = execution_id, error = %error, "workflow failed");
            self.bus.publish(
                "workflow.failed",
                json!({"execution_id": execution_id, "error": error}),
            );
            self.settle(execution_id);
            return;
        }

        let (all_terminal, any_completed) = {
            let state = live.state.lock();
            (
                state.steps.values().all(StepState::is_terminal),
                state.steps.values().any(|s| *s == StepState::Completed),
            )
        };

        if all_terminal && any_completed {
            self.store.execution_set_status(
                execution_id,
                ExecutionStatus::Completed,
                None,
                Some(now),
            );
            self.bus.publish("workflow.completed", json!({"execution_id": execution_id}));
            info!(execution = execution_id, "workflow completed");
        } else {
            // Every step skipped, or a dependency chain that can no longer
            // make progress. Either way the execution cannot complete.
            let error = if all_terminal { "no step completed" } else { "execution stalled" };
            warn!(execution = execution_id, error, "workflow did not complete");
            self.store.execution_set_status(
                execution_id,
                ExecutionStatus::Failed,
                Some(error),
                Some(now),
            );
            self.bus.publish(
                "workflow.failed",
                json!({"execution_id": execution_id, "error": error}),
            );
        }
        self.settle(execution_id);
    }
}

/// Run one task step with its retry policy.
async fn run_task(
    runner: Arc<dyn StepRunner>,
    store: Arc<Store>,
    execution_id: String,
    step: StepDefinition,
    input: Value,
) -> StepOutcome {
    let operation = match &step.kind {
        StepKind::Task { operation, .. } => operation.clone(),
        StepKind::Approval { .. } => unreachable!("approval steps are not spawned"),
    };
    let retry = step.retry;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match runner.run_operation(&operation, &input).await {
            Ok(value) => return StepOutcome { step_id: step.id, result: Ok(value) },
            Err(fault) if attempts < retry.max_attempts => {
                warn!(
                    execution = %execution_id,
                    step = %step.id,
                    attempt = attempts,
                    error = %fault,
                    "step failed, retrying"
                );
                store.step_set_retry(&execution_id, &step.id, attempts);
                tokio::time::sleep(Duration::from_millis(retry.backoff_ms)).await;
            }
            Err(fault) => return StepOutcome { step_id: step.id, result: Err(fault) },
        }
    }
}
