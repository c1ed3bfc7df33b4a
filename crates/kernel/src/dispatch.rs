// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch glue: the supervisor behind the scheduler and the workflow
//! engine.
//!
//! Both seams funnel into `Supervisor::send`; workflow steps re-enter the
//! router first so the whitelist holds inside workflows too.

use std::sync::Arc;

use async_trait::async_trait;
use clerk_core::{Clock, CommandId, Fault, SystemClock};
use clerk_workflow::StepRunner;
use serde_json::{json, Value};

use crate::env;
use crate::router::{self, Destination};
use crate::scheduler::TaskDispatch;
use crate::supervisor::Supervisor;

/// Routes scheduler tasks and workflow steps to workers.
pub struct WorkerDispatch<C: Clock = SystemClock> {
    supervisor: Arc<Supervisor<C>>,
}

impl<C: Clock> WorkerDispatch<C> {
    pub fn new(supervisor: Arc<Supervisor<C>>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl<C: Clock> TaskDispatch for WorkerDispatch<C> {
    async fn dispatch(
        &self,
        worker: &str,
        method: &str,
        payload: Value,
        correlation: &str,
    ) -> Result<Value, Fault> {
        self.supervisor.send(worker, method, payload, correlation, env::request_timeout()).await
    }
}

#[async_trait]
impl<C: Clock> StepRunner for WorkerDispatch<C> {
    async fn run_operation(&self, operation: &str, input: &Value) -> Result<Value, Fault> {
        let route = router::route(operation).ok_or_else(|| Fault::unknown_operation(operation))?;
        match route.destination {
            Destination::Worker(worker) => {
                let correlation = CommandId::generate();
                self.supervisor
                    .send(
                        worker,
                        route.method,
                        input.clone(),
                        correlation.as_str(),
                        env::request_timeout(),
                    )
                    .await
            }
            Destination::Local if operation == "PING" => Ok(json!({"message": "PONG"})),
            Destination::Local => Err(Fault::validation(format!(
                "operation '{operation}' is not a worker task and cannot be a workflow step"
            ))),
        }
    }
}
