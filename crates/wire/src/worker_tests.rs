// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn ready_line_classifies() {
    let line = r#"{"type":"READY","engine":"python","version":"2.1.0","capabilities":["export_pdf","ocr_extract"]}"#;
    match WorkerLine::classify(line) {
        WorkerLine::Ready(ready) => {
            assert_eq!(ready.engine, "python");
            assert_eq!(ready.capabilities.len(), 2);
        }
        other => panic!("expected Ready, got {other:?}"),
    }
}

#[test]
fn reply_with_known_shape_classifies() {
    let line = r#"{"id":"cmd-1","success":true,"result":{"pages":3}}"#;
    match WorkerLine::classify(line) {
        WorkerLine::Reply(reply) => {
            assert_eq!(reply.id, "cmd-1");
            assert!(reply.success);
            assert_eq!(reply.result, Some(json!({"pages": 3})));
        }
        other => panic!("expected Reply, got {other:?}"),
    }
}

#[test]
fn error_reply_carries_code_and_message() {
    let line = r#"{"id":"cmd-2","success":false,"error":{"code":"ENGINE_ERROR","message":"no such template"}}"#;
    match WorkerLine::classify(line) {
        WorkerLine::Reply(reply) => {
            let err = reply.error.unwrap();
            assert_eq!(err.code, "ENGINE_ERROR");
            assert_eq!(err.message, "no such template");
        }
        other => panic!("expected Reply, got {other:?}"),
    }
}

#[yare::parameterized(
    no_success_flag = { r#"{"id":"x","progress":50}"# },
    no_id           = { r#"{"success":true}"# },
    plain_event     = { r#"{"event":"ocr.progress","pct":10}"# },
)]
fn unsolicited_json_classifies_as_event(line: &str) {
    assert!(matches!(WorkerLine::classify(line), WorkerLine::Event(_)));
}

#[test]
fn non_json_classifies_as_garbage() {
    assert!(matches!(
        WorkerLine::classify("Traceback (most recent call last):"),
        WorkerLine::Garbage(_)
    ));
}

#[test]
fn command_serializes_method_and_params() {
    let cmd = WorkerCommand::new("cmd-9", "pdf_merge", Some(json!({"inputs": ["a.pdf"]})));
    let json = serde_json::to_value(&cmd).unwrap();
    assert_eq!(json, json!({"id": "cmd-9", "method": "pdf_merge", "params": {"inputs": ["a.pdf"]}}));
}

#[test]
fn command_accepts_type_and_payload_aliases() {
    let cmd: WorkerCommand =
        serde_json::from_str(r#"{"id":"c","type":"export_pdf","payload":{"a":1}}"#).unwrap();
    assert_eq!(cmd.method, "export_pdf");
    assert_eq!(cmd.params, Some(json!({"a": 1})));
}

#[test]
fn shutdown_command_uses_fixed_method() {
    assert_eq!(WorkerCommand::shutdown("c1").method, "SHUTDOWN");
}
