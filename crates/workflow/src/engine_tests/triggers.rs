// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::ErrorCode;
use serde_json::json;

fn triggered_definition() -> WorkflowDefinition {
    definition(
        "on-scan",
        vec![task(
            "ingest",
            "INGEST",
            json!({"source": "${initial.trigger_event}", "path": "${initial.path}"}),
        )],
    )
}

#[tokio::test]
async fn event_starts_workflow_with_trigger_context() {
    let h = harness();
    h.engine.registry().insert(triggered_definition());
    h.runner.answer("INGEST", json!({}));

    h.engine.register_trigger("document.scanned", "on-scan").unwrap();
    h.bus.publish_sync("document.scanned", &json!({"path": "/inbox/a.pdf"}));

    // The handler starts the workflow synchronously; wait for the driver.
    let executions = h.store.recent_executions(10);
    assert_eq!(executions.len(), 1);
    let execution_id = executions[0].execution_id.clone();
    wait_for_status(&h.store, &execution_id, ExecutionStatus::Completed).await;

    assert_eq!(executions[0].context["trigger_event"], json!("document.scanned"));
    assert_eq!(executions[0].context["path"], json!("/inbox/a.pdf"));
    assert!(executions[0].context["trigger_timestamp"].is_u64());

    assert_eq!(
        h.runner.calls_for("INGEST"),
        vec![json!({"source": "document.scanned", "path": "/inbox/a.pdf"})]
    );
}

#[tokio::test]
async fn unregister_stops_future_starts() {
    let h = harness();
    h.engine.registry().insert(triggered_definition());
    h.runner.answer("INGEST", json!({}));

    h.engine.register_trigger("document.scanned", "on-scan").unwrap();
    assert!(h.engine.unregister_trigger("document.scanned", "on-scan"));
    h.bus.publish_sync("document.scanned", &json!({}));

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(h.store.recent_executions(10).is_empty());
    // Unregistering again reports nothing removed.
    assert!(!h.engine.unregister_trigger("document.scanned", "on-scan"));
}

#[tokio::test]
async fn register_is_idempotent_per_pair() {
    let h = harness();
    h.engine.registry().insert(triggered_definition());
    h.runner.answer("INGEST", json!({}));

    h.engine.register_trigger("t", "on-scan").unwrap();
    h.engine.register_trigger("t", "on-scan").unwrap();
    assert_eq!(h.engine.list_triggers().len(), 1);

    h.bus.publish_sync("t", &json!({}));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(h.store.recent_executions(10).len(), 1);
}

#[tokio::test]
async fn registering_for_unknown_workflow_fails() {
    let h = harness();
    let err = h.engine.register_trigger("t", "ghost").unwrap_err();
    assert_eq!(err.code, ErrorCode::WorkflowNotFound);
    assert!(h.engine.list_triggers().is_empty());
}

#[tokio::test]
async fn list_triggers_reports_bindings() {
    let h = harness();
    h.engine.registry().insert(triggered_definition());
    h.engine.register_trigger("a", "on-scan").unwrap();
    h.engine.register_trigger("b", "on-scan").unwrap();

    let mut bindings = h.engine.list_triggers();
    bindings.sort();
    assert_eq!(
        bindings,
        vec![("a".to_string(), "on-scan".to_string()), ("b".to_string(), "on-scan".to_string())]
    );
}
