// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One supervised worker subprocess.
//!
//! Piped stdio, one long-running reader task per stream. Stdout is
//! protocol: ready announcement, replies matched to the pending map by
//! correlation id, everything else an unsolicited event. Stderr is log
//! text, scrubbed and never parsed.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use clerk_core::{scrub_text, ErrorCode, EventBus, Fault};
use clerk_wire::{read_json_line, write_json_line, ReadyAnnouncement, WorkerCommand, WorkerLine, WorkerReply};
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How to launch a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    pub name: String,
    /// Program to execute: the interpreter, or the executable itself.
    pub program: String,
    pub args: Vec<String>,
}

/// Where a worker is in its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerHealth {
    /// Spawned, ready announcement not yet seen.
    Starting,
    /// Announced ready; accepting commands.
    Ready,
    /// Exited (or never became ready) outside of shutdown.
    Dead,
    /// Deliberately stopped by the kernel.
    Stopped,
}

impl WorkerHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerHealth::Starting => "starting",
            WorkerHealth::Ready => "ready",
            WorkerHealth::Dead => "dead",
            WorkerHealth::Stopped => "stopped",
        }
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<WorkerReply>>>>;

pub struct WorkerProcess {
    pub name: String,
    stdin: tokio::sync::Mutex<tokio::process::ChildStdin>,
    pending: Pending,
    health: Mutex<WorkerHealth>,
    announcement: Mutex<Option<ReadyAnnouncement>>,
    exited: watch::Receiver<bool>,
    kill: CancellationToken,
}

impl WorkerProcess {
    /// Spawn the subprocess and await its ready announcement.
    ///
    /// A missed `ready_timeout` is fatal for the worker: the subprocess is
    /// killed and a start error returned. `on_exit` receives the worker
    /// name once the process is gone, however it went.
    pub async fn spawn(
        spec: &WorkerSpec,
        bus: EventBus,
        ready_timeout: Duration,
        on_exit: mpsc::UnboundedSender<String>,
    ) -> Result<Arc<WorkerProcess>, Fault> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Fault::new(
                    ErrorCode::EngineUnavailable,
                    format!("worker '{}' failed to spawn: {e}", spec.name),
                )
            })?;

        let stdin = child.stdin.take().ok_or_else(|| Fault::engine_unavailable(&spec.name))?;
        let stdout = child.stdout.take().ok_or_else(|| Fault::engine_unavailable(&spec.name))?;
        let stderr = child.stderr.take().ok_or_else(|| Fault::engine_unavailable(&spec.name))?;

        let (exited_tx, exited_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();
        let kill = CancellationToken::new();

        let worker = Arc::new(WorkerProcess {
            name: spec.name.clone(),
            stdin: tokio::sync::Mutex::new(stdin),
            pending: Arc::new(Mutex::new(HashMap::new())),
            health: Mutex::new(WorkerHealth::Starting),
            announcement: Mutex::new(None),
            exited: exited_rx,
            kill: kill.clone(),
        });

        // Stdout reader: the only protocol surface.
        {
            let worker = Arc::clone(&worker);
            let bus = bus.clone();
            let mut ready_tx = Some(ready_tx);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout);
                loop {
                    let line = match read_json_line(&mut reader).await {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(worker = %worker.name, error = %e, "stdout read failed");
                            break;
                        }
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match WorkerLine::classify(&line) {
                        WorkerLine::Ready(announcement) => {
                            info!(
                                worker = %worker.name,
                                engine = %announcement.engine,
                                version = %announcement.version,
                                capabilities = announcement.capabilities.len(),
                                "worker ready"
                            );
                            *worker.announcement.lock() = Some(announcement.clone());
                            *worker.health.lock() = WorkerHealth::Ready;
                            if let Some(tx) = ready_tx.take() {
                                let _ = tx.send(announcement);
                            }
                        }
                        WorkerLine::Reply(reply) => {
                            let waiter = worker.pending.lock().remove(&reply.id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(reply);
                                }
                                None => debug!(
                                    worker = %worker.name,
                                    id = %reply.id,
                                    "reply without pending request"
                                ),
                            }
                        }
                        WorkerLine::Event(event) => {
                            bus.publish(&format!("engine.{}.event", worker.name), event);
                        }
                        WorkerLine::Garbage(text) => {
                            debug!(worker = %worker.name, line = %scrub_text(&text), "stray stdout")
                        }
                    }
                }
            });
        }

        // Stderr reader: log text only.
        {
            let name = spec.name.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                while let Ok(Some(line)) = read_json_line(&mut reader).await {
                    debug!(worker = %name, "stderr: {}", scrub_text(&line));
                }
            });
        }

        // Monitor: wait for exit, honoring the kill switch.
        {
            let worker = Arc::clone(&worker);
            let bus = bus.clone();
            let kill = kill.clone();
            tokio::spawn(async move {
                let status = tokio::select! {
                    status = child.wait() => status,
                    _ = kill.cancelled() => {
                        let _ = child.start_kill();
                        child.wait().await
                    }
                };
                let code = status.ok().and_then(|s| s.code());
                let intentional = {
                    let mut health = worker.health.lock();
                    if *health == WorkerHealth::Stopped {
                        true
                    } else {
                        *health = WorkerHealth::Dead;
                        false
                    }
                };
                // A dying worker answers nobody; fail its waiters now.
                worker.pending.lock().clear();
                info!(worker = %worker.name, code, intentional, "worker exited");
                bus.publish(
                    "engine.stopped",
                    json!({"engine": worker.name.clone(), "code": code, "intentional": intentional}),
                );
                let _ = exited_tx.send(true);
                let _ = on_exit.send(worker.name.clone());
            });
        }

        match tokio::time::timeout(ready_timeout, ready_rx).await {
            Ok(Ok(_announcement)) => Ok(worker),
            Ok(Err(_)) => {
                kill.cancel();
                Err(Fault::new(
                    ErrorCode::EngineUnavailable,
                    format!("worker '{}' exited before announcing ready", spec.name),
                ))
            }
            Err(_) => {
                error!(worker = %spec.name, "ready handshake deadline exceeded, killing");
                kill.cancel();
                Err(Fault::new(
                    ErrorCode::EngineUnavailable,
                    format!("worker '{}' missed the ready handshake deadline", spec.name),
                ))
            }
        }
    }

    pub fn health(&self) -> WorkerHealth {
        self.health.lock().clone()
    }

    pub fn is_alive(&self) -> bool {
        !*self.exited.borrow()
    }

    pub fn announcement(&self) -> Option<ReadyAnnouncement> {
        self.announcement.lock().clone()
    }

    /// Send one command line and await the matching reply.
    ///
    /// A deadline removes the pending entry and reports `TIMEOUT`; the
    /// entry cannot leak.
    pub async fn send_and_receive(
        &self,
        command: WorkerCommand,
        deadline: Duration,
    ) -> Result<WorkerReply, Fault> {
        if self.health() != WorkerHealth::Ready {
            return Err(Fault::engine_unavailable(&self.name));
        }
        let correlation = command.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(correlation.clone(), tx);

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = write_json_line(&mut *stdin, &command).await {
                self.pending.lock().remove(&correlation);
                return Err(Fault::new(
                    ErrorCode::EngineUnavailable,
                    format!("worker '{}' stdin write failed: {e}", self.name),
                ));
            }
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Fault::engine_error(format!(
                "worker '{}' exited before answering request {correlation}",
                self.name
            ))),
            Err(_) => {
                self.pending.lock().remove(&correlation);
                Err(Fault::timeout(format!(
                    "worker '{}' did not answer request {correlation} within {deadline:?}",
                    self.name
                )))
            }
        }
    }

    /// Fire the `SHUTDOWN` command; after `grace`, force-kill.
    pub async fn shutdown(&self, grace: Duration) {
        *self.health.lock() = WorkerHealth::Stopped;
        {
            let mut stdin = self.stdin.lock().await;
            let _ = write_json_line(&mut *stdin, &WorkerCommand::shutdown("shutdown")).await;
        }
        let mut exited = self.exited.clone();
        let already_gone = *exited.borrow();
        if !already_gone
            && tokio::time::timeout(grace, exited.changed()).await.is_err()
        {
            warn!(worker = %self.name, "grace period expired, force-killing");
            self.kill.cancel();
            let _ = exited.changed().await;
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
