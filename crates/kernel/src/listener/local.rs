// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for kernel-local operations.

use std::sync::Arc;

use clerk_advisor::DraftKind;
use clerk_core::{Clock, Fault};
use clerk_storage::TaskStatus;
use clerk_wire::{Request, Response};
use serde_json::{json, Value};
use tracing::info;

use super::KernelCtx;

const DEFAULT_QUERY_LIMIT: usize = 100;

pub(super) async fn handle<C: Clock>(ctx: &Arc<KernelCtx<C>>, request: Request) -> Response {
    let now = ctx.clock.epoch_ms();
    let payload = request.payload_or_null();
    let outcome = match request.op.as_str() {
        "PING" => Ok(json!({
            "message": "PONG",
            "version": env!("CARGO_PKG_VERSION"),
            "instance_id": ctx.instance_id,
        })),
        "GET_STATUS" => Ok(status(ctx)),
        "GET_ENGINE_STATUS" => Ok(ctx.supervisor.engine_status()),

        "QUERY_CONTRACTS" => query_contracts(ctx, &payload),
        "GET_CONTRACT_BY_ID" => contract_by_id(ctx, &payload),
        "QUERY_EXECUTION_HISTORY" => query_history(ctx, &payload),
        "QUERY_ACTIVITY_LOGS" => query_activity(ctx, &payload),

        "START_WORKFLOW" => start_workflow(ctx, &payload),
        "RESOLVE_APPROVAL" => resolve_approval(ctx, &payload),
        "GET_PENDING_APPROVALS" => Ok(pending_approvals(ctx)),
        "REGISTER_WORKFLOW_TRIGGER" => register_trigger(ctx, &payload),
        "UNREGISTER_WORKFLOW_TRIGGER" => unregister_trigger(ctx, &payload),
        "LIST_WORKFLOW_TRIGGERS" => Ok(list_triggers(ctx)),

        "GET_AI_SUGGESTIONS" => Ok(suggestions(ctx, &payload)),
        "GENERATE_DRAFT" => generate_draft(ctx, &payload),

        "SHUTDOWN" => {
            info!("shutdown requested by front-end");
            ctx.shutdown.notify_waiters();
            Ok(json!({"shutting_down": true}))
        }

        // The router only sends whitelisted locals here.
        other => Err(Fault::internal(format!("local operation '{other}' has no handler"))),
    };
    match outcome {
        Ok(result) => Response::ok(request.id, result, now),
        Err(fault) => Response::fail(request.id, fault, now),
    }
}

fn status<C: Clock>(ctx: &KernelCtx<C>) -> Value {
    json!({
        "instance_id": ctx.instance_id,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_ms": ctx.start_time.elapsed().as_millis() as u64,
        "scheduler": {
            "running": ctx.scheduler.is_running(),
            "queue_depth": ctx.scheduler.queue_depth(),
        },
        "engines": ctx.supervisor.engine_status(),
        "pending_approvals": ctx.engine.list_pending_approvals().len(),
        "workflows_loaded": ctx.engine.registry().ids().len(),
    })
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Result<&'a str, Fault> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Fault::validation(format!("payload field '{key}' is required")))
}

fn limit(payload: &Value) -> usize {
    payload
        .get("limit")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_QUERY_LIMIT)
        .min(1_000)
}

fn query_contracts<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Result<Value, Fault> {
    let filter = payload.get("filter").and_then(Value::as_str);
    let contracts = ctx.store.query_contracts(filter, limit(payload));
    let count = contracts.len();
    Ok(json!({"count": count, "contracts": contracts}))
}

fn contract_by_id<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Result<Value, Fault> {
    let id = payload
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| Fault::validation("payload field 'id' is required"))?;
    match ctx.store.contract_by_id(id) {
        Some(contract) => {
            let stages = ctx.store.payment_stages_for(id);
            Ok(json!({"contract": contract, "payment_stages": stages}))
        }
        None => Err(Fault::validation(format!("no contract with id {id}"))),
    }
}

fn query_history<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Result<Value, Fault> {
    let tasks = match payload.get("status").and_then(Value::as_str) {
        Some(status) => {
            ctx.store.tasks_with_status(TaskStatus::parse(status), limit(payload))
        }
        None => ctx.store.recent_tasks(limit(payload)),
    };
    Ok(json!({"tasks": tasks}))
}

fn query_activity<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Result<Value, Fault> {
    let rows = match payload.get("action").and_then(Value::as_str) {
        Some(action) => ctx.store.activity_by_action(action, limit(payload)),
        None => ctx.store.recent_activity(limit(payload)),
    };
    Ok(json!({"entries": rows}))
}

fn start_workflow<C: Clock>(ctx: &Arc<KernelCtx<C>>, payload: &Value) -> Result<Value, Fault> {
    let workflow_id = str_field(payload, "workflow_id")?;
    let context = payload.get("context").cloned().unwrap_or_else(|| json!({}));
    let execution_id = ctx.engine.start_workflow(workflow_id, context)?;
    Ok(json!({"execution_id": execution_id, "workflow_id": workflow_id}))
}

fn resolve_approval<C: Clock>(ctx: &Arc<KernelCtx<C>>, payload: &Value) -> Result<Value, Fault> {
    let execution_id = str_field(payload, "execution_id")?;
    let step_id = str_field(payload, "step_id")?;
    let decision = str_field(payload, "decision")?;
    let actor = payload.get("actor").and_then(Value::as_str).unwrap_or("frontend");
    let comment = payload.get("comment").and_then(Value::as_str);
    ctx.engine.resolve_approval(execution_id, step_id, decision, actor, comment)
}

fn pending_approvals<C: Clock>(ctx: &KernelCtx<C>) -> Value {
    json!({"approvals": ctx.engine.list_pending_approvals()})
}

fn register_trigger<C: Clock>(ctx: &Arc<KernelCtx<C>>, payload: &Value) -> Result<Value, Fault> {
    let topic = str_field(payload, "topic")?;
    let workflow_id = str_field(payload, "workflow_id")?;
    ctx.engine.register_trigger(topic, workflow_id)?;
    Ok(json!({"registered": true, "topic": topic, "workflow_id": workflow_id}))
}

fn unregister_trigger<C: Clock>(ctx: &Arc<KernelCtx<C>>, payload: &Value) -> Result<Value, Fault> {
    let topic = str_field(payload, "topic")?;
    let workflow_id = str_field(payload, "workflow_id")?;
    let removed = ctx.engine.unregister_trigger(topic, workflow_id);
    Ok(json!({"removed": removed}))
}

fn list_triggers<C: Clock>(ctx: &KernelCtx<C>) -> Value {
    let triggers: Vec<Value> = ctx
        .engine
        .list_triggers()
        .into_iter()
        .map(|(topic, workflow_id)| json!({"topic": topic, "workflow_id": workflow_id}))
        .collect();
    json!({"triggers": triggers})
}

fn suggestions<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Value {
    let context = payload.get("context").and_then(Value::as_str);
    json!({"suggestions": ctx.advisor.suggestions(context)})
}

fn generate_draft<C: Clock>(ctx: &KernelCtx<C>, payload: &Value) -> Result<Value, Fault> {
    let kind_name = str_field(payload, "kind")?;
    let kind = DraftKind::parse(kind_name)
        .ok_or_else(|| Fault::validation(format!("unknown draft kind '{kind_name}'")))?;
    let params = payload.get("params").cloned().unwrap_or_else(|| json!({}));
    let draft = ctx.advisor.generate_draft(kind, &params)?;
    Ok(json!({"draft": draft}))
}
