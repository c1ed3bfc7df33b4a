// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task scheduler: one bounded FIFO queue, one worker loop.
//!
//! Worker-destined requests are enqueued here; the loop opens an
//! execution-history record, dispatches through the supervisor, records
//! the outcome, and answers the caller. Backpressure is synchronous:
//! `QUEUE_FULL` when the queue is at capacity, `SCHEDULER_STOPPED` once
//! stop has begun.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clerk_core::{digest_value, Clock, ErrorCode, Fault};
use clerk_storage::Store;
use clerk_core::EventBus;
use clerk_wire::{Request, Response};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Executes a routed task against a worker.
#[async_trait]
pub trait TaskDispatch: Send + Sync + 'static {
    async fn dispatch(
        &self,
        worker: &str,
        method: &str,
        payload: Value,
        correlation: &str,
    ) -> Result<Value, Fault>;
}

struct QueuedTask {
    request: Request,
    worker: &'static str,
    method: &'static str,
    respond: oneshot::Sender<Response>,
}

pub struct Scheduler {
    tx: mpsc::Sender<QueuedTask>,
    running: Arc<AtomicBool>,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Start the worker loop and return the submission handle.
    pub fn start<C: Clock>(
        store: Arc<Store>,
        bus: EventBus,
        dispatcher: Arc<dyn TaskDispatch>,
        clock: C,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let depth = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        tokio::spawn(worker_loop(
            rx,
            store,
            bus,
            dispatcher,
            clock,
            Arc::clone(&depth),
            cancel.clone(),
        ));
        Self { tx, running, depth, cancel }
    }

    /// Enqueue a routed request. The receiver resolves with the response;
    /// a dropped receiver means the scheduler stopped before dispatch.
    pub fn submit(
        &self,
        request: Request,
        worker: &'static str,
        method: &'static str,
    ) -> Result<oneshot::Receiver<Response>, Fault> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Fault::new(ErrorCode::SchedulerStopped, "scheduler is stopped"));
        }
        let (respond, rx) = oneshot::channel();
        let task = QueuedTask { request, worker, method, respond };
        match self.tx.try_send(task) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                Ok(rx)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(Fault::new(ErrorCode::QueueFull, "task queue is at capacity"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Fault::new(ErrorCode::SchedulerStopped, "scheduler is stopped"))
            }
        }
    }

    /// Queued-but-not-yet-dispatched task count.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Reject new submissions and interrupt the loop. The in-flight
    /// dispatch finishes its round-trip; queued tasks are dropped, which
    /// resolves their callers with `SCHEDULER_STOPPED`.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("scheduler stopping");
            self.cancel.cancel();
        }
    }
}

async fn worker_loop<C: Clock>(
    mut rx: mpsc::Receiver<QueuedTask>,
    store: Arc<Store>,
    bus: EventBus,
    dispatcher: Arc<dyn TaskDispatch>,
    clock: C,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            // Stop wins over a ready queue item.
            biased;
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        depth.fetch_sub(1, Ordering::SeqCst);
        execute(&store, &bus, dispatcher.as_ref(), &clock, task).await;
    }
    debug!("scheduler loop exited");
}

async fn execute<C: Clock>(
    store: &Store,
    bus: &EventBus,
    dispatcher: &dyn TaskDispatch,
    clock: &C,
    task: QueuedTask,
) {
    let QueuedTask { request, worker, method, respond } = task;
    let payload = request.payload_or_null();
    let input_summary = digest_value(&payload);
    let contract_id =
        payload.get("contract_id").and_then(Value::as_i64).filter(|id| *id > 0);

    let started = clock.epoch_ms();
    let history_id =
        store.task_begin(&request.op, worker, Some(&input_summary), contract_id, started);
    bus.publish("task.queued", json!({"id": history_id, "operation": request.op.clone()}));

    store.task_running(history_id);
    bus.publish(
        "task.started",
        json!({"id": history_id, "operation": request.op.clone(), "worker": worker}),
    );

    let outcome = dispatcher.dispatch(worker, method, payload, &request.id).await;
    let finished = clock.epoch_ms();
    let response = match outcome {
        Ok(result) => {
            store.task_completed(history_id, Some(&digest_value(&result)), finished);
            bus.publish(
                "task.completed",
                json!({"id": history_id, "operation": request.op.clone(), "duration_ms": finished.saturating_sub(started)}),
            );
            Response::ok(request.id, result, finished)
        }
        Err(fault) => {
            store.task_failed(history_id, &fault.message, finished);
            bus.publish(
                "task.failed",
                json!({"id": history_id, "operation": request.op.clone(), "error": fault.message.clone()}),
            );
            Response::fail(request.id, fault, finished)
        }
    };
    // The caller may have gone away; that is not an error.
    let _ = respond.send(response);
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
