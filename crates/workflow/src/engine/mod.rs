// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow engine: public operations and execution bookkeeping.
//!
//! `start_workflow` persists a `running` execution and hands it to a driver
//! task; approvals park the execution and `resolve_approval` re-enters it;
//! `resume_in_progress` rebuilds every open execution from its rows at
//! kernel start. Durability rule: every transition is persisted before the
//! next in-memory one.

mod drive;
mod state;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use clerk_core::{Clock, ErrorCode, EventBus, ExecutionId, Fault, SubscriptionId, SystemClock};
use clerk_storage::{ApprovalRecord, ApprovalResolution, ExecutionStatus, StepStatus, Store};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::definition::{OnFailure, WorkflowRegistry};
use crate::runner::StepRunner;
use state::{LiveExecution, StepState};

/// Decision class of an approval resolution word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    /// Reject-class words; every other allowed word approves.
    pub fn classify(word: &str) -> ApprovalDecision {
        const REJECT_WORDS: &[&str] = &["REJECT", "DENY", "DECLINE"];
        if REJECT_WORDS.iter().any(|w| word.eq_ignore_ascii_case(w)) {
            ApprovalDecision::Reject
        } else {
            ApprovalDecision::Approve
        }
    }
}

/// An event-topic → workflow coupling.
#[derive(Debug, Clone)]
pub struct TriggerBinding {
    pub topic: String,
    pub workflow_id: String,
    token: SubscriptionId,
}

pub struct WorkflowEngine<C: Clock = SystemClock> {
    this: Weak<Self>,
    registry: Arc<WorkflowRegistry>,
    store: Arc<Store>,
    bus: EventBus,
    runner: Arc<dyn StepRunner>,
    clock: C,
    triggers: Mutex<Vec<TriggerBinding>>,
    live: Mutex<HashMap<String, Arc<LiveExecution>>>,
}

impl<C: Clock> WorkflowEngine<C> {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        store: Arc<Store>,
        bus: EventBus,
        runner: Arc<dyn StepRunner>,
        clock: C,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry,
            store,
            bus,
            runner,
            clock,
            triggers: Mutex::new(Vec::new()),
            live: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Start a new execution of `workflow_id` and return its id.
    ///
    /// The definition is validated, the execution row is persisted in
    /// `running`, and a driver task takes over; this returns immediately.
    pub fn start_workflow(
        &self,
        workflow_id: &str,
        initial: Value,
    ) -> Result<ExecutionId, Fault> {
        let def = self
            .registry
            .get(workflow_id)
            .ok_or_else(|| Fault::new(ErrorCode::WorkflowNotFound, format!("no workflow '{workflow_id}'")))?;
        def.validate().map_err(|e| Fault::validation(e.to_string()))?;

        let execution_id = ExecutionId::generate();
        let now = self.clock.epoch_ms();
        self.store.execution_insert(execution_id.as_str(), workflow_id, &initial, now);
        self.bus.publish(
            "workflow.started",
            json!({"execution_id": execution_id.as_str(), "workflow_id": workflow_id}),
        );
        info!(execution = %execution_id, workflow = workflow_id, "workflow started");

        let live = Arc::new(LiveExecution::new(execution_id.clone(), def, initial));
        self.live.lock().insert(execution_id.as_str().to_string(), Arc::clone(&live));
        self.spawn_driver(live);
        Ok(execution_id)
    }

    /// Resolve a pending human approval.
    ///
    /// Idempotent after the first resolution: later calls return
    /// `APPROVAL_ALREADY_RESOLVED` without touching any state.
    pub fn resolve_approval(
        &self,
        execution_id: &str,
        step_id: &str,
        decision: &str,
        actor: &str,
        comment: Option<&str>,
    ) -> Result<Value, Fault> {
        let row = self.store.approval_for_step(execution_id, step_id).ok_or_else(|| {
            Fault::new(
                ErrorCode::ApprovalNotFound,
                format!("no approval for step '{step_id}' of execution '{execution_id}'"),
            )
        })?;
        if !row.allowed_actions.iter().any(|a| a.eq_ignore_ascii_case(decision)) {
            return Err(Fault::validation(format!(
                "decision '{decision}' is not one of {:?}",
                row.allowed_actions
            )));
        }

        let execution = self.store.execution_by_id(execution_id).ok_or_else(|| {
            Fault::new(ErrorCode::ApprovalNotFound, format!("no execution '{execution_id}'"))
        })?;
        if execution.status.is_terminal() {
            return Err(Fault::validation(format!(
                "execution '{execution_id}' already finished ({})",
                execution.status.as_str()
            )));
        }

        let now = self.clock.epoch_ms();
        match self.store.approval_resolve(execution_id, step_id, decision, actor, comment, now) {
            ApprovalResolution::Resolved => {}
            ApprovalResolution::AlreadyResolved => {
                return Err(Fault::new(
                    ErrorCode::ApprovalAlreadyResolved,
                    format!("approval for step '{step_id}' was already resolved"),
                ));
            }
            ApprovalResolution::NotFound => {
                return Err(Fault::new(
                    ErrorCode::ApprovalNotFound,
                    format!("no approval for step '{step_id}'"),
                ));
            }
        }
        self.bus.publish(
            "workflow.approval.resolved",
            json!({
                "execution_id": execution_id,
                "step_id": step_id,
                "decision": decision,
                "actor": actor,
            }),
        );

        let live = self.live_execution(execution_id)?;
        let class = ApprovalDecision::classify(decision);
        self.apply_approval_outcome(&live, step_id, class, decision, actor, comment, now);
        self.spawn_driver(Arc::clone(&live));
        Ok(json!({
            "execution_id": execution_id,
            "step_id": step_id,
            "decision": decision,
            "resolved": true,
        }))
    }

    /// Snapshot of unresolved approvals belonging to executions that are
    /// actually waiting on one.
    pub fn list_pending_approvals(&self) -> Vec<ApprovalRecord> {
        self.store
            .pending_approvals()
            .into_iter()
            .filter(|approval| {
                self.store
                    .execution_by_id(&approval.execution_id)
                    .map(|e| e.status == ExecutionStatus::PausedForApproval)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Couple an event topic to a workflow start. Idempotent per pair.
    pub fn register_trigger(&self, topic: &str, workflow_id: &str) -> Result<(), Fault> {
        if self.registry.get(workflow_id).is_none() {
            return Err(Fault::new(
                ErrorCode::WorkflowNotFound,
                format!("no workflow '{workflow_id}'"),
            ));
        }
        let mut triggers = self.triggers.lock();
        if triggers.iter().any(|t| t.topic == topic && t.workflow_id == workflow_id) {
            return Ok(());
        }
        let weak: Weak<Self> = self.this.clone();
        let workflow = workflow_id.to_string();
        let token = self.bus.subscribe(topic, move |event_topic, payload| {
            let Some(engine) = weak.upgrade() else { return };
            engine.fire_trigger(&workflow, event_topic, payload);
        });
        triggers.push(TriggerBinding {
            topic: topic.to_string(),
            workflow_id: workflow_id.to_string(),
            token,
        });
        info!(topic, workflow = workflow_id, "workflow trigger registered");
        Ok(())
    }

    pub fn unregister_trigger(&self, topic: &str, workflow_id: &str) -> bool {
        let mut triggers = self.triggers.lock();
        let before = triggers.len();
        triggers.retain(|t| {
            if t.topic == topic && t.workflow_id == workflow_id {
                self.bus.unsubscribe(t.token);
                false
            } else {
                true
            }
        });
        triggers.len() < before
    }

    pub fn list_triggers(&self) -> Vec<(String, String)> {
        self.triggers.lock().iter().map(|t| (t.topic.clone(), t.workflow_id.clone())).collect()
    }

    /// Re-enter every execution left open by the previous kernel process.
    /// Called exactly once at startup, before the front-end listener runs.
    pub fn resume_in_progress(&self) -> usize {
        let open = self.store.executions_with_status(&[
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::PausedForApproval,
        ]);
        let pending_steps: Vec<(String, String)> = self
            .store
            .pending_approvals()
            .into_iter()
            .map(|a| (a.execution_id, a.step_id))
            .collect();

        let mut resumed = 0;
        for record in open {
            let Some(def) = self.registry.get(&record.workflow_id) else {
                warn!(
                    execution = %record.execution_id,
                    workflow = %record.workflow_id,
                    "cannot resume: definition missing; failing execution"
                );
                self.store.execution_set_status(
                    &record.execution_id,
                    ExecutionStatus::Failed,
                    Some("workflow definition missing at restart"),
                    Some(self.clock.epoch_ms()),
                );
                continue;
            };
            let rows = self.store.steps_for_execution(&record.execution_id);
            let parked: Vec<String> = pending_steps
                .iter()
                .filter(|(exec, _)| exec == &record.execution_id)
                .map(|(_, step)| step.clone())
                .collect();
            let live = Arc::new(LiveExecution::rehydrate(
                ExecutionId::from_string(record.execution_id.clone()),
                def,
                record.context.clone(),
                &rows,
                &parked,
            ));
            self.live.lock().insert(record.execution_id.clone(), Arc::clone(&live));
            self.bus.publish(
                "workflow.resumed",
                json!({"execution_id": record.execution_id.clone(), "workflow_id": record.workflow_id}),
            );
            info!(execution = %record.execution_id, "resuming execution");
            self.spawn_driver(live);
            resumed += 1;
        }
        resumed
    }

    // --- internals ---

    fn fire_trigger(&self, workflow_id: &str, topic: &str, payload: &Value) {
        let mut initial = Map::new();
        initial.insert("trigger_event".to_string(), json!(topic));
        initial.insert("trigger_timestamp".to_string(), json!(self.clock.epoch_ms()));
        if let Value::Object(fields) = payload {
            for (k, v) in fields {
                initial.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        if let Err(e) = self.start_workflow(workflow_id, Value::Object(initial)) {
            warn!(workflow = workflow_id, topic, error = %e, "trigger failed to start workflow");
        }
    }

    /// Fetch the live execution, rebuilding it from rows when the kernel
    /// restarted since the approval was requested.
    fn live_execution(&self, execution_id: &str) -> Result<Arc<LiveExecution>, Fault> {
        if let Some(live) = self.live.lock().get(execution_id) {
            return Ok(Arc::clone(live));
        }
        let record = self.store.execution_by_id(execution_id).ok_or_else(|| {
            Fault::new(ErrorCode::ApprovalNotFound, format!("no execution '{execution_id}'"))
        })?;
        let def = self.registry.get(&record.workflow_id).ok_or_else(|| {
            Fault::new(
                ErrorCode::WorkflowNotFound,
                format!("definition '{}' missing", record.workflow_id),
            )
        })?;
        let rows = self.store.steps_for_execution(execution_id);
        let parked: Vec<String> = self
            .store
            .pending_approvals()
            .into_iter()
            .filter(|a| a.execution_id == execution_id)
            .map(|a| a.step_id)
            .collect();
        let live = Arc::new(LiveExecution::rehydrate(
            ExecutionId::from_string(execution_id),
            def,
            record.context,
            &rows,
            &parked,
        ));
        self.live.lock().insert(execution_id.to_string(), Arc::clone(&live));
        Ok(live)
    }

    /// Apply a resolved approval to the step graph.
    fn apply_approval_outcome(
        &self,
        live: &Arc<LiveExecution>,
        step_id: &str,
        class: ApprovalDecision,
        decision: &str,
        actor: &str,
        comment: Option<&str>,
        now: u64,
    ) {
        let execution_id = live.execution_id.as_str();
        match class {
            ApprovalDecision::Approve => {
                let result = json!({"decision": decision, "actor": actor, "comment": comment});
                self.store.step_finish(
                    execution_id,
                    step_id,
                    StepStatus::Completed,
                    Some(&result),
                    None,
                    now,
                );
                self.bus.publish(
                    "workflow.step.completed",
                    json!({"execution_id": execution_id, "step_id": step_id}),
                );
                let mut state = live.state.lock();
                state.steps.insert(step_id.to_string(), StepState::Completed);
                state.results.insert(step_id.to_string(), result);
                for dependent in live.edges.dependents.get(step_id).into_iter().flatten() {
                    if let Some(d) = state.indegree.get_mut(dependent) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
            ApprovalDecision::Reject => {
                let error = format!("rejected by {actor}");
                let on_failure = live.def.step(step_id).map(|s| s.on_failure).unwrap_or_default();
                match on_failure {
                    OnFailure::Skip => {
                        self.store.step_finish(
                            execution_id,
                            step_id,
                            StepStatus::Skipped,
                            None,
                            Some(&error),
                            now,
                        );
                        self.bus.publish(
                            "workflow.step.skipped",
                            json!({"execution_id": execution_id, "step_id": step_id}),
                        );
                        let mut state = live.state.lock();
                        state.steps.insert(step_id.to_string(), StepState::Skipped);
                        for dependent in live.edges.dependents.get(step_id).into_iter().flatten() {
                            if let Some(d) = state.indegree.get_mut(dependent) {
                                *d = d.saturating_sub(1);
                            }
                        }
                    }
                    OnFailure::Fail => {
                        self.store.step_finish(
                            execution_id,
                            step_id,
                            StepStatus::Failed,
                            None,
                            Some(&error),
                            now,
                        );
                        self.bus.publish(
                            "workflow.step.failed",
                            json!({"execution_id": execution_id, "step_id": step_id, "error": error.clone()}),
                        );
                        let mut state = live.state.lock();
                        state.steps.insert(step_id.to_string(), StepState::Failed);
                        state.failing = Some(error);
                    }
                }
            }
        }

        // Status invariant: paused_for_approval holds only while some
        // approval is still unresolved.
        let (still_parked, failing) = {
            let state = live.state.lock();
            (
                state.steps.values().any(|s| *s == StepState::AwaitingApproval),
                state.failing.is_some(),
            )
        };
        if !still_parked && !failing {
            self.store.execution_set_status(execution_id, ExecutionStatus::Running, None, None);
        }
    }

    /// Executions with a driver task or spawned steps right now. Parked
    /// executions (waiting on an approval) do not count; their state is
    /// durable.
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .values()
            .filter(|live| {
                let state = live.state.lock();
                state.driving || state.running > 0
            })
            .count()
    }

    fn settle(&self, execution_id: &str) {
        self.live.lock().remove(execution_id);
    }
}

#[cfg(test)]
#[path = "../engine_tests/mod.rs"]
mod tests;
