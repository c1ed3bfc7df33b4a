// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel lifecycle: startup sequence, single-instance guard, ordered
//! teardown.
//!
//! Teardown order is fixed: scheduler stop → workflow-engine drain →
//! supervisor stop → configuration save → store close.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clerk_advisor::{AdvisorService, Guardrail};
use clerk_core::{Clock, EventBus, SystemClock};
use clerk_storage::{Activity, Store, StoreError};
use clerk_workflow::{WorkflowEngine, WorkflowRegistry};
use fs2::FileExt;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::WorkerDispatch;
use crate::env;
use crate::gateway::Gateway;
use crate::listener::{self, KernelCtx};
use crate::scheduler::Scheduler;
use crate::state::ConfigState;
use crate::supervisor::Supervisor;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("another clerkd instance holds the lock at {path}")]
    AlreadyRunning { path: String },

    #[error("cannot prepare directories: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open the store: {0}")]
    Store(#[from] StoreError),
}

/// Filesystem layout of one installation.
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub workflows_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub lock_path: PathBuf,
}

/// Resolve the per-user layout, honoring `CLERK_DATA_DIR` and
/// `CLERK_CONFIG_DIR` overrides.
pub fn resolve_paths() -> Paths {
    let data_dir = std::env::var("CLERK_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("clerk")
    });
    let config_dir = std::env::var("CLERK_CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("clerk")
    });
    Paths {
        db_path: data_dir.join("clerk.db"),
        log_dir: data_dir.join("logs"),
        lock_path: data_dir.join("clerkd.lock"),
        workflows_dir: config_dir.join("workflows"),
        data_dir,
        config_dir,
    }
}

/// Advisory file lock so only one kernel runs per data directory.
pub struct InstanceLock {
    _file: File,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self, StartupError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        file.try_lock_exclusive().map_err(|_| StartupError::AlreadyRunning {
            path: path.display().to_string(),
        })?;
        Ok(Self { _file: file })
    }
}

/// Boot the kernel, serve stdin/stdout until shutdown, tear down in
/// order. Returns once teardown finishes.
pub async fn run(paths: Paths) -> Result<(), StartupError> {
    let _lock = InstanceLock::acquire(&paths.lock_path)?;
    let clock = SystemClock;

    let store = Arc::new(Store::open(&paths.db_path)?);
    let (bus, pump) = EventBus::new();
    tokio::spawn(pump.run());

    let state = Arc::new(ConfigState::load(&paths.config_dir, bus.clone()));
    register_activity_bridge(&bus, Arc::clone(&store), clock.clone());

    let registry = Arc::new(WorkflowRegistry::new());
    let loaded = registry.load_dir(&paths.workflows_dir);
    info!(count = loaded, "workflow definitions loaded");

    let supervisor =
        Supervisor::new(bus.clone(), Arc::clone(&store), clock.clone(), env::ready_timeout());
    let started = supervisor.start_from_config(&state.worker_modules(), &paths.config_dir).await;
    info!(count = started, "workers started");

    let dispatch = Arc::new(WorkerDispatch::new(Arc::clone(&supervisor)));
    let engine = WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        bus.clone(),
        Arc::clone(&dispatch) as Arc<dyn clerk_workflow::StepRunner>,
        clock.clone(),
    );
    let resumed = engine.resume_in_progress();
    info!(count = resumed, "open workflow executions resumed");

    let scheduler = Scheduler::start(
        Arc::clone(&store),
        bus.clone(),
        dispatch as Arc<dyn crate::scheduler::TaskDispatch>,
        clock.clone(),
        env::queue_capacity(),
    );

    let advisor = AdvisorService::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Guardrail::load(&paths.config_dir.join("guardrail.json")),
        clock.clone(),
    );

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(KernelCtx {
        store: Arc::clone(&store),
        bus,
        state: Arc::clone(&state),
        gateway: Gateway::new(Arc::clone(&store), clock.clone()),
        scheduler,
        supervisor: Arc::clone(&supervisor),
        engine: Arc::clone(&engine),
        advisor,
        clock,
        start_time: Instant::now(),
        instance_id: Uuid::new_v4().to_string(),
        shutdown: Arc::clone(&shutdown),
    });

    // Ctrl-C behaves like a front-end SHUTDOWN.
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                shutdown.notify_waiters();
            }
        });
    }

    info!(instance = %ctx.instance_id, "kernel ready");
    listener::run(Arc::clone(&ctx), BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    // Ordered teardown.
    ctx.scheduler.stop();
    drain_engine(&engine, Duration::from_secs(2)).await;
    supervisor.shutdown_all(env::shutdown_grace()).await;
    if let Err(e) = state.save() {
        warn!(error = %e, "configuration save failed");
    }
    info!("kernel stopped");
    Ok(())
}

/// Mirror workflow lifecycle events into the structured activity log.
fn register_activity_bridge(bus: &EventBus, store: Arc<Store>, clock: SystemClock) {
    const TOPICS: &[&str] = &[
        "workflow.started",
        "workflow.completed",
        "workflow.failed",
        "workflow.resumed",
        "workflow.approval.requested",
        "workflow.approval.resolved",
    ];
    for topic in TOPICS {
        let store = Arc::clone(&store);
        let clock = clock.clone();
        bus.subscribe(topic, move |topic, payload| {
            let entity = payload
                .get("execution_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            store.log_activity(
                &Activity::new(topic, payload.to_string())
                    .entity("workflow_execution", entity)
                    .module("workflow"),
                clock.epoch_ms(),
            );
        });
    }
}

/// Give in-flight workflow executions a moment to park or finish; their
/// durable state makes anything unfinished resumable on the next start.
async fn drain_engine(engine: &Arc<WorkflowEngine>, grace: Duration) {
    let deadline = Instant::now() + grace;
    while engine.live_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let remaining = engine.live_count();
    if remaining > 0 {
        info!(remaining, "executions still open; they will resume on next start");
    }
}
