// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker supervision.
//!
//! Owns every worker subprocess: spawn from configuration, request
//! multiplexing, health, bounded auto-restart, and ordered shutdown. A
//! worker that keeps crashing is moved to a dead-letter state and stays
//! unavailable until the next kernel start.

mod worker;

pub use worker::{WorkerHealth, WorkerProcess, WorkerSpec};

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clerk_core::{Clock, ErrorCode, EventBus, Fault, SystemClock};
use clerk_storage::{Activity, Severity, Store};
use clerk_wire::WorkerCommand;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::state::WorkerModule;

/// Restart budget: at most this many restarts per rolling window.
const MAX_RESTARTS: usize = 3;
const RESTART_WINDOW_MS: u64 = 60_000;

pub struct Supervisor<C: Clock = SystemClock> {
    bus: EventBus,
    store: Arc<Store>,
    clock: C,
    ready_timeout: Duration,
    workers: Mutex<HashMap<String, Arc<WorkerProcess>>>,
    specs: Mutex<HashMap<String, WorkerSpec>>,
    restart_log: Mutex<HashMap<String, Vec<u64>>>,
    dead: Mutex<HashSet<String>>,
    shutting_down: AtomicBool,
    exit_tx: mpsc::UnboundedSender<String>,
}

impl<C: Clock> Supervisor<C> {
    /// Create the supervisor and its exit-handling task.
    pub fn new(
        bus: EventBus,
        store: Arc<Store>,
        clock: C,
        ready_timeout: Duration,
    ) -> Arc<Self> {
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<String>();
        let supervisor = Arc::new(Self {
            bus,
            store,
            clock,
            ready_timeout,
            workers: Mutex::new(HashMap::new()),
            specs: Mutex::new(HashMap::new()),
            restart_log: Mutex::new(HashMap::new()),
            dead: Mutex::new(HashSet::new()),
            shutting_down: AtomicBool::new(false),
            exit_tx,
        });
        {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move {
                while let Some(name) = exit_rx.recv().await {
                    supervisor.handle_exit(&name).await;
                }
            });
        }
        supervisor
    }

    /// Spawn every enabled worker from the modules configuration.
    /// Individual start failures are recorded; the kernel stays up.
    pub async fn start_from_config(&self, modules: &[WorkerModule], base_dir: &Path) -> usize {
        let mut started = 0;
        for module in modules {
            if !module.enabled {
                info!(worker = %module.name, "worker disabled in configuration");
                continue;
            }
            let spec = spec_for(module, base_dir);
            match self.start_worker(spec).await {
                Ok(()) => started += 1,
                Err(e) => {
                    error!(worker = %module.name, error = %e, "worker failed to start");
                    self.mark_dead(&module.name, &e.message);
                }
            }
        }
        started
    }

    pub async fn start_worker(&self, spec: WorkerSpec) -> Result<(), Fault> {
        let name = spec.name.clone();
        self.specs.lock().insert(name.clone(), spec.clone());
        let worker = WorkerProcess::spawn(
            &spec,
            self.bus.clone(),
            self.ready_timeout,
            self.exit_tx.clone(),
        )
        .await?;
        self.workers.lock().insert(name.clone(), worker);
        self.dead.lock().remove(&name);
        self.store.log_activity(
            &Activity::new("engine.started", format!("worker '{name}' is ready"))
                .entity("worker", name)
                .module("supervisor"),
            self.clock.epoch_ms(),
        );
        Ok(())
    }

    /// Dispatch one command to a worker and await the reply.
    pub async fn send(
        &self,
        worker_name: &str,
        method: &str,
        params: Value,
        correlation: &str,
        deadline: Duration,
    ) -> Result<Value, Fault> {
        let worker = self.workers.lock().get(worker_name).cloned();
        let Some(worker) = worker else {
            return Err(Fault::engine_unavailable(worker_name));
        };
        let params = if params.is_null() { None } else { Some(params) };
        let command = WorkerCommand::new(correlation, method, params);
        let reply = worker.send_and_receive(command, deadline).await?;
        if reply.success {
            Ok(reply.result.unwrap_or(Value::Null))
        } else {
            let error = reply.error.unwrap_or_default();
            let code = parse_error_code(&error.code).unwrap_or(ErrorCode::EngineError);
            let message = if error.message.is_empty() {
                format!("worker '{worker_name}' reported an unspecified error")
            } else {
                error.message
            };
            Err(Fault::new(code, message))
        }
    }

    /// Per-worker health, announcement data, and dead-letter state.
    pub fn engine_status(&self) -> Value {
        let workers = self.workers.lock();
        let dead = self.dead.lock();
        let mut engines = Map::new();
        let names: HashSet<String> =
            workers.keys().cloned().chain(self.specs.lock().keys().cloned()).collect();
        for name in names {
            let entry = match workers.get(&name) {
                Some(worker) => {
                    let announcement = worker.announcement();
                    json!({
                        "health": worker.health().as_str(),
                        "alive": worker.is_alive(),
                        "engine": announcement.as_ref().map(|a| a.engine.clone()),
                        "version": announcement.as_ref().map(|a| a.version.clone()),
                        "capabilities": announcement.map(|a| a.capabilities).unwrap_or_default(),
                    })
                }
                None => json!({"health": "dead", "alive": false}),
            };
            let mut entry = entry;
            if dead.contains(&name) {
                entry["dead_lettered"] = json!(true);
            }
            engines.insert(name, entry);
        }
        Value::Object(engines)
    }

    pub fn worker_health(&self, name: &str) -> Option<WorkerHealth> {
        self.workers.lock().get(name).map(|w| w.health())
    }

    /// Send `SHUTDOWN` to every worker, then force-kill stragglers after
    /// the grace period.
    pub async fn shutdown_all(&self, grace: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let workers: Vec<Arc<WorkerProcess>> =
            self.workers.lock().values().cloned().collect();
        for worker in workers {
            worker.shutdown(grace).await;
        }
        info!("all workers stopped");
    }

    async fn handle_exit(&self, name: &str) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        warn!(worker = name, "worker exited while running");
        self.store.log_activity(
            &Activity::new("engine.stopped", format!("worker '{name}' exited unexpectedly"))
                .severity(Severity::Warning)
                .entity("worker", name.to_string())
                .module("supervisor"),
            self.clock.epoch_ms(),
        );

        let spec = self.specs.lock().get(name).cloned();
        let Some(spec) = spec else { return };

        let now = self.clock.epoch_ms();
        let within_budget = {
            let mut log = self.restart_log.lock();
            let entries = log.entry(name.to_string()).or_default();
            entries.retain(|t| now.saturating_sub(*t) < RESTART_WINDOW_MS);
            if entries.len() < MAX_RESTARTS {
                entries.push(now);
                true
            } else {
                false
            }
        };
        if !within_budget {
            error!(worker = name, "restart budget exhausted, dead-lettering worker");
            self.workers.lock().remove(name);
            self.mark_dead(name, "restart budget exhausted");
            return;
        }

        info!(worker = name, "restarting worker");
        match self.start_worker(spec).await {
            Ok(()) => {
                self.store.log_activity(
                    &Activity::new("engine.restarted", format!("worker '{name}' restarted"))
                        .entity("worker", name.to_string())
                        .module("supervisor"),
                    self.clock.epoch_ms(),
                );
            }
            Err(e) => {
                error!(worker = name, error = %e, "restart failed");
                self.workers.lock().remove(name);
                self.mark_dead(name, &e.message);
            }
        }
    }

    fn mark_dead(&self, name: &str, reason: &str) {
        self.dead.lock().insert(name.to_string());
        self.store.log_activity(
            &Activity::new("engine.dead", format!("worker '{name}' unavailable: {reason}"))
                .severity(Severity::Error)
                .entity("worker", name.to_string())
                .module("supervisor"),
            self.clock.epoch_ms(),
        );
    }
}

fn parse_error_code(code: &str) -> Option<ErrorCode> {
    serde_json::from_value(Value::String(code.to_string())).ok()
}

fn spec_for(module: &WorkerModule, base_dir: &Path) -> WorkerSpec {
    let path = if Path::new(&module.path).is_absolute() {
        module.path.clone()
    } else {
        base_dir.join(&module.path).to_string_lossy().into_owned()
    };
    match &module.interpreter {
        Some(interpreter) => WorkerSpec {
            name: module.name.clone(),
            program: interpreter.clone(),
            args: vec![path],
        },
        None => WorkerSpec { name: module.name.clone(), program: path, args: Vec::new() },
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
