// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-execution in-memory state.
//!
//! One [`LiveExecution`] exists per non-terminal execution. Its mutex is
//! the per-execution lock completions are published under, so in-degree
//! updates are race-free; it is never held across an await.

use std::collections::HashMap;
use std::sync::Arc;

use clerk_core::ExecutionId;
use clerk_storage::{StepExecutionRecord, StepStatus};
use parking_lot::Mutex;
use serde_json::Value;

use crate::definition::{StepKind, WorkflowDefinition};

/// Scheduling state of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepState {
    Pending,
    Running,
    AwaitingApproval,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    pub(crate) fn is_satisfied(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Skipped)
    }

    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Failed | StepState::Skipped)
    }
}

/// Dependency edges actually used for scheduling: declared edges for DAG
/// definitions, the implicit declaration-order chain otherwise. This is
/// what makes `max_parallelism = 1` and sequential execution coincide.
pub(crate) struct Edges {
    pub deps: HashMap<String, Vec<String>>,
    pub dependents: HashMap<String, Vec<String>>,
}

pub(crate) fn effective_edges(def: &WorkflowDefinition) -> Edges {
    let mut deps: HashMap<String, Vec<String>> = HashMap::new();
    if def.is_dag() {
        for step in &def.steps {
            deps.insert(step.id.clone(), step.depends_on.clone());
        }
    } else {
        let mut previous: Option<&str> = None;
        for step in &def.steps {
            deps.insert(step.id.clone(), previous.map(|p| vec![p.to_string()]).unwrap_or_default());
            previous = Some(&step.id);
        }
    }
    let mut dependents: HashMap<String, Vec<String>> =
        def.steps.iter().map(|s| (s.id.clone(), Vec::new())).collect();
    for (step, step_deps) in &deps {
        for dep in step_deps {
            if let Some(list) = dependents.get_mut(dep) {
                list.push(step.clone());
            }
        }
    }
    Edges { deps, dependents }
}

/// Downstream closure of `from` over the effective edges.
pub(crate) fn downstream(edges: &Edges, from: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![from.to_string()];
    let mut seen = std::collections::HashSet::new();
    while let Some(id) = stack.pop() {
        for dependent in edges.dependents.get(&id).into_iter().flatten() {
            if seen.insert(dependent.clone()) {
                out.push(dependent.clone());
                stack.push(dependent.clone());
            }
        }
    }
    out
}

pub(crate) struct ExecState {
    pub initial: Value,
    pub results: HashMap<String, Value>,
    pub steps: HashMap<String, StepState>,
    pub indegree: HashMap<String, usize>,
    /// Task steps currently spawned.
    pub running: usize,
    /// A driver task currently owns scheduling for this execution.
    pub driving: bool,
    /// Set on a fail-policy failure; blocks all further scheduling.
    pub failing: Option<String>,
}

pub(crate) struct LiveExecution {
    pub execution_id: ExecutionId,
    pub def: Arc<WorkflowDefinition>,
    pub edges: Edges,
    pub state: Mutex<ExecState>,
}

impl LiveExecution {
    /// Fresh state for a newly started execution.
    pub fn new(execution_id: ExecutionId, def: Arc<WorkflowDefinition>, initial: Value) -> Self {
        let edges = effective_edges(&def);
        let steps = def.steps.iter().map(|s| (s.id.clone(), StepState::Pending)).collect();
        let indegree =
            def.steps.iter().map(|s| (s.id.clone(), edges.deps[&s.id].len())).collect();
        Self {
            execution_id,
            def,
            edges,
            state: Mutex::new(ExecState {
                initial,
                results: HashMap::new(),
                steps,
                indegree,
                running: 0,
                driving: false,
                failing: None,
            }),
        }
    }

    /// Rebuild state from persisted step rows (resume path). Completed and
    /// skipped rows keep their outcome; rows caught mid-run re-enter as
    /// pending, except approval steps with an unresolved approval, which
    /// stay parked.
    pub fn rehydrate(
        execution_id: ExecutionId,
        def: Arc<WorkflowDefinition>,
        initial: Value,
        rows: &[StepExecutionRecord],
        pending_approval_steps: &[String],
    ) -> Self {
        let live = Self::new(execution_id, def, initial);
        {
            let mut state = live.state.lock();
            for row in rows {
                let step_state = match row.status {
                    StepStatus::Completed => {
                        state
                            .results
                            .insert(row.step_id.clone(), row.result.clone().unwrap_or(Value::Null));
                        StepState::Completed
                    }
                    StepStatus::Skipped => StepState::Skipped,
                    StepStatus::Failed => StepState::Failed,
                    StepStatus::Running => {
                        let parked = pending_approval_steps.contains(&row.step_id)
                            && matches!(
                                live.def.step(&row.step_id).map(|s| &s.kind),
                                Some(StepKind::Approval { .. })
                            );
                        if parked {
                            StepState::AwaitingApproval
                        } else {
                            StepState::Pending
                        }
                    }
                };
                state.steps.insert(row.step_id.clone(), step_state);
            }
            // A failed row means the previous process died between the
            // step failure and the execution transition; finish the job.
            if state.steps.values().any(|s| *s == StepState::Failed) {
                state.failing = Some("step failed before restart".to_string());
            }
            // Recompute in-degrees from what is already satisfied.
            for step in &live.def.steps {
                let unsatisfied = live.edges.deps[&step.id]
                    .iter()
                    .filter(|dep| {
                        !state.steps.get(*dep).map(StepState::is_satisfied).unwrap_or(false)
                    })
                    .count();
                state.indegree.insert(step.id.clone(), unsatisfied);
            }
        }
        live
    }
}
