// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Front-end listener.
//!
//! Reads one JSON request per line, answers with exactly one response
//! line carrying the same correlation id. Requests are handled on their
//! own tasks; responses are serialized through a single writer task, so
//! slow operations never block the read loop or interleave output.

mod local;

use std::sync::Arc;
use std::time::Instant;

use clerk_advisor::AdvisorService;
use clerk_core::{Clock, EventBus, Fault, SystemClock};
use clerk_storage::Store;
use clerk_wire::{read_json_line, write_json_line, Request, Response};
use clerk_workflow::WorkflowEngine;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::gateway::Gateway;
use crate::router::{self, Destination};
use crate::scheduler::Scheduler;
use crate::state::ConfigState;
use crate::supervisor::Supervisor;

/// Shared kernel context for request handlers.
pub struct KernelCtx<C: Clock = SystemClock> {
    pub store: Arc<Store>,
    pub bus: EventBus,
    pub state: Arc<ConfigState>,
    pub gateway: Gateway<C>,
    pub scheduler: Scheduler,
    pub supervisor: Arc<Supervisor<C>>,
    pub engine: Arc<WorkflowEngine<C>>,
    pub advisor: AdvisorService<C>,
    pub clock: C,
    pub start_time: Instant,
    pub instance_id: String,
    pub shutdown: Arc<Notify>,
}

/// Run the listener until EOF or a `SHUTDOWN` request.
pub async fn run<C, R, W>(ctx: Arc<KernelCtx<C>>, reader: R, writer: W)
where
    C: Clock,
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (response_tx, response_rx) = mpsc::channel::<Response>(64);

    let writer_task = tokio::spawn(write_loop(writer, response_rx));
    read_loop(Arc::clone(&ctx), reader, response_tx).await;
    let _ = writer_task.await;
    info!("listener stopped");
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<Response>) {
    while let Some(response) = rx.recv().await {
        if let Err(e) = write_json_line(&mut writer, &response).await {
            warn!(error = %e, "response write failed");
            break;
        }
    }
}

async fn read_loop<C, R>(ctx: Arc<KernelCtx<C>>, mut reader: R, response_tx: mpsc::Sender<Response>)
where
    C: Clock,
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = ctx.shutdown.notified() => break,
            line = read_json_line(&mut reader) => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("front-end closed stdin");
                ctx.shutdown.notify_waiters();
                break;
            }
            Err(e) => {
                warn!(error = %e, "request read failed");
                ctx.shutdown.notify_waiters();
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let raw_len = line.len();
        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                // Echo the id back if one is recoverable from the line.
                let id = serde_json::from_str::<Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                debug!(error = %e, "malformed request line");
                let fault = Fault::validation(format!("malformed request: {e}"));
                let _ = response_tx
                    .send(Response::fail(id, fault, ctx.clock.epoch_ms()))
                    .await;
                continue;
            }
        };

        let ctx = Arc::clone(&ctx);
        let response_tx = response_tx.clone();
        tokio::spawn(async move {
            let response = handle_request(&ctx, request, raw_len).await;
            let _ = response_tx.send(response).await;
        });
    }
}

/// Gateway → router → local handler or scheduler.
pub async fn handle_request<C: Clock>(
    ctx: &Arc<KernelCtx<C>>,
    request: Request,
    raw_len: usize,
) -> Response {
    let now = || ctx.clock.epoch_ms();

    if let Err(fault) = ctx.gateway.validate(&request, raw_len) {
        return Response::fail(request.id, fault, now());
    }

    let Some(route) = router::route(&request.op) else {
        return Response::fail(request.id, Fault::unknown_operation(&request.op), now());
    };

    match route.destination {
        Destination::Local => local::handle(ctx, request).await,
        Destination::Worker(worker) => {
            match ctx.scheduler.submit(request.clone(), worker, route.method) {
                Ok(rx) => match rx.await {
                    Ok(response) => response,
                    // The scheduler stopped with this task still queued.
                    Err(_) => Response::fail(
                        request.id,
                        Fault::new(
                            clerk_core::ErrorCode::SchedulerStopped,
                            "kernel is shutting down",
                        ),
                        now(),
                    ),
                },
                Err(fault) => Response::fail(request.id, fault, now()),
            }
        }
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
