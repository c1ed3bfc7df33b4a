// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tests: sequential, DAG, approvals, resume, triggers.

mod approvals;
mod dag;
mod resume;
mod sequential;
mod triggers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clerk_core::{EventBus, FakeClock};
use clerk_storage::{ExecutionStatus, Store};
use serde_json::Value;

use crate::definition::{
    OnFailure, RetryPolicy, StepDefinition, StepKind, TimeoutPolicy, WorkflowDefinition,
    WorkflowRegistry,
};
use crate::engine::WorkflowEngine;
use crate::runner::ScriptedRunner;

pub(crate) struct Harness {
    pub engine: Arc<WorkflowEngine<FakeClock>>,
    pub store: Arc<Store>,
    pub runner: ScriptedRunner,
    pub bus: EventBus,
}

pub(crate) fn harness() -> Harness {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let registry = Arc::new(WorkflowRegistry::new());
    let (bus, _pump) = EventBus::new();
    let runner = ScriptedRunner::new();
    let engine = WorkflowEngine::new(
        registry,
        Arc::clone(&store),
        bus.clone(),
        Arc::new(runner.clone()),
        FakeClock::at(1_000),
    );
    Harness { engine, store, runner, bus }
}

/// Fresh engine over an existing store, as after a kernel restart.
pub(crate) fn restarted(previous: &Harness) -> Harness {
    let registry = Arc::new(WorkflowRegistry::new());
    for id in previous.engine.registry().ids() {
        if let Some(def) = previous.engine.registry().get(&id) {
            registry.insert((*def).clone());
        }
    }
    let (bus, _pump) = EventBus::new();
    let runner = ScriptedRunner::new();
    let engine = WorkflowEngine::new(
        registry,
        Arc::clone(&previous.store),
        bus.clone(),
        Arc::new(runner.clone()),
        FakeClock::at(2_000),
    );
    Harness { engine, store: Arc::clone(&previous.store), runner, bus }
}

pub(crate) fn task(id: &str, operation: &str, input: Value) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        kind: StepKind::Task { operation: operation.to_string(), input },
        retry: RetryPolicy::default(),
        on_failure: OnFailure::Fail,
        timeout_policy: TimeoutPolicy::Wait,
        depends_on: Vec::new(),
    }
}

pub(crate) fn approval(id: &str, prompt: &str) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        kind: StepKind::Approval {
            prompt: prompt.to_string(),
            allowed_decisions: vec!["APPROVE".to_string(), "REJECT".to_string()],
        },
        retry: RetryPolicy::default(),
        on_failure: OnFailure::Fail,
        timeout_policy: TimeoutPolicy::Wait,
        depends_on: Vec::new(),
    }
}

pub(crate) fn with_deps(mut step: StepDefinition, deps: &[&str]) -> StepDefinition {
    step.depends_on = deps.iter().map(|d| d.to_string()).collect();
    step
}

pub(crate) fn definition(id: &str, steps: Vec<StepDefinition>) -> WorkflowDefinition {
    WorkflowDefinition {
        id: id.to_string(),
        version: "1.0".to_string(),
        max_parallelism: None,
        variables: HashMap::new(),
        steps,
    }
}

/// Poll the store until the execution reaches `expect` (5 s cap).
pub(crate) async fn wait_for_status(store: &Store, execution_id: &str, expect: ExecutionStatus) {
    for _ in 0..1_000 {
        if store.execution_by_id(execution_id).map(|e| e.status) == Some(expect) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let actual = store.execution_by_id(execution_id).map(|e| e.status);
    panic!("execution {execution_id} did not reach {expect:?} (is {actual:?})");
}
