// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture: a full kernel context over temp storage, with the
//! worker seam replaced by a scripted runner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clerk_advisor::{AdvisorService, Guardrail, GuardrailPolicy};
use clerk_core::{EventBus, FakeClock};
use clerk_kernel::dispatch::WorkerDispatch;
use clerk_kernel::{ConfigState, Gateway, KernelCtx, Scheduler, Supervisor};
use clerk_storage::{ExecutionStatus, Store};
use clerk_wire::{Request, Response};
use clerk_workflow::{ScriptedRunner, WorkflowDefinition, WorkflowEngine, WorkflowRegistry};
use tokio::sync::Notify;

pub struct Kernel {
    pub ctx: Arc<KernelCtx<FakeClock>>,
    pub runner: ScriptedRunner,
    pub store: Arc<Store>,
    _config_dir: tempfile::TempDir,
}

/// Build a kernel over the given store (pass `None` for a fresh one).
/// Reusing a store across two kernels models a restart.
pub fn kernel_over(existing: Option<Arc<Store>>) -> Kernel {
    let config_dir = tempfile::tempdir().expect("tempdir");
    let store =
        existing.unwrap_or_else(|| Arc::new(Store::open_in_memory().expect("in-memory store")));
    let (bus, pump) = EventBus::new();
    tokio::spawn(pump.run());
    let clock = FakeClock::at(1_700_000_000_000);
    let state = Arc::new(ConfigState::load(config_dir.path(), bus.clone()));
    let supervisor =
        Supervisor::new(bus.clone(), Arc::clone(&store), clock.clone(), Duration::from_millis(500));
    let scheduler = Scheduler::start(
        Arc::clone(&store),
        bus.clone(),
        Arc::new(WorkerDispatch::new(Arc::clone(&supervisor))),
        clock.clone(),
        16,
    );
    let registry = Arc::new(WorkflowRegistry::new());
    let runner = ScriptedRunner::new();
    let engine = WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        bus.clone(),
        Arc::new(runner.clone()),
        clock.clone(),
    );
    let advisor = AdvisorService::new(
        Arc::clone(&store),
        registry,
        Guardrail::new(GuardrailPolicy::default()),
        clock.clone(),
    );
    let gateway = Gateway::new(Arc::clone(&store), clock.clone());
    let ctx = Arc::new(KernelCtx {
        store: Arc::clone(&store),
        bus,
        state,
        gateway,
        scheduler,
        supervisor,
        engine,
        advisor,
        clock,
        start_time: Instant::now(),
        instance_id: "specs".to_string(),
        shutdown: Arc::new(Notify::new()),
    });
    Kernel { ctx, runner, store, _config_dir: config_dir }
}

pub fn kernel() -> Kernel {
    kernel_over(None)
}

impl Kernel {
    pub fn define(&self, json: &str) {
        self.ctx
            .engine
            .registry()
            .insert(WorkflowDefinition::from_json(json).expect("valid definition"));
    }

    /// One front-end request through gateway → router → handler.
    pub async fn request(&self, request: Request) -> Response {
        let raw_len = serde_json::to_string(&request).map(|s| s.len()).unwrap_or(0);
        clerk_kernel::listener::handle_request(&self.ctx, request, raw_len).await
    }

    pub async fn wait_for_status(&self, execution_id: &str, expect: ExecutionStatus) {
        for _ in 0..1_000 {
            if self.store.execution_by_id(execution_id).map(|e| e.status) == Some(expect) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let actual = self.store.execution_by_id(execution_id).map(|e| e.status);
        panic!("execution {execution_id} did not reach {expect:?} (is {actual:?})");
    }
}
