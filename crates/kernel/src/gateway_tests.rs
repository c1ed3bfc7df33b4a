// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::{ErrorCode, FakeClock};
use serde_json::json;

fn gateway() -> Gateway<FakeClock> {
    Gateway::new(Arc::new(Store::open_in_memory().unwrap()), FakeClock::at(1))
}

fn request(op: &str, payload: Value) -> Request {
    Request::new("m1", op).with_payload(payload)
}

#[test]
fn valid_request_passes() {
    let g = gateway();
    let req = request("EXPORT_PDF", json!({"path": "exports/invoice.pdf"}));
    g.validate(&req, 100).unwrap();
}

#[test]
fn oversized_request_is_rejected() {
    let g = gateway();
    let req = request("PING", json!({}));
    let err = g.validate(&req, MAX_REQUEST_BYTES + 1).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[yare::parameterized(
    empty_id    = { "", "PING" },
    blank_id    = { "  ", "PING" },
    empty_op    = { "m1", "" },
)]
fn empty_identity_fields_are_rejected(id: &str, op: &str) {
    let g = gateway();
    let req = Request::new(id, op);
    assert_eq!(g.validate(&req, 10).unwrap_err().code, ErrorCode::ValidationFailed);
}

#[yare::parameterized(
    parent_prefix   = { "../secrets.pdf" },
    embedded        = { "exports/../../etc/shadow.pdf" },
    trailing        = { "exports/.." },
    backslash_style = { "exports\\..\\secret.pdf" },
)]
fn traversal_sequences_are_rejected(path: &str) {
    let g = gateway();
    let req = request("PDF_MERGE", json!({"inputs": [path]}));
    let err = g.validate(&req, 100).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert!(err.message.contains("traversal"));
}

#[yare::parameterized(
    etc    = { "/etc/passwd.txt" },
    proc_  = { "/proc/self/environ.txt" },
    win    = { "C:\\Windows\\system32\\config.txt" },
)]
fn protected_directories_are_rejected(path: &str) {
    let g = gateway();
    let req = request("EXPORT_PDF", json!({"path": path}));
    let err = g.validate(&req, 100).unwrap_err();
    assert!(err.message.contains("protected directory"));
}

#[test]
fn overlong_path_is_rejected() {
    let g = gateway();
    let long = format!("exports/{}.pdf", "x".repeat(5000));
    let req = request("EXPORT_PDF", json!({"path": long}));
    assert_eq!(g.validate(&req, 100).unwrap_err().code, ErrorCode::ValidationFailed);
}

#[test]
fn disallowed_extension_is_rejected_for_document_ops() {
    let g = gateway();
    let req = request("EXPORT_PDF", json!({"output_path": "exports/run.exe"}));
    let err = g.validate(&req, 100).unwrap_err();
    assert!(err.message.contains(".exe"));
}

#[test]
fn non_document_ops_skip_path_rules() {
    let g = gateway();
    // EXTERNAL_API_CALL is a network op; its payload is not path-checked.
    let req = request("EXTERNAL_API_CALL", json!({"path": "/etc/whatever.exe"}));
    g.validate(&req, 100).unwrap();
}

#[test]
fn nested_path_keys_are_found() {
    let g = gateway();
    let req = request("PDF_WATERMARK", json!({"options": {"source": "../../x.pdf"}}));
    assert!(g.validate(&req, 100).is_err());
}

#[test]
fn basic_auth_credentials_surface_not_implemented() {
    let g = gateway();
    let req = request(
        "SAVE_CREDENTIAL",
        json!({"provider": "acme", "auth_type": "basic", "username": "u", "password": "p"}),
    );
    assert_eq!(g.validate(&req, 100).unwrap_err().code, ErrorCode::NotImplemented);

    let token_req =
        request("SAVE_CREDENTIAL", json!({"provider": "acme", "auth_type": "api_key"}));
    g.validate(&token_req, 100).unwrap();
}

#[test]
fn rejections_are_logged_as_security_events() {
    let g = gateway();
    let req = request("EXPORT_PDF", json!({"path": "../x.pdf"}));
    let _ = g.validate(&req, 100);

    let rows = g.store.activity_by_action("gateway.rejected", 10);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].severity, Severity::Security);
    assert_eq!(rows[0].entity_id.as_deref(), Some("m1"));
}
