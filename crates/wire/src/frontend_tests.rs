// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::ErrorCode;
use serde_json::json;

#[test]
fn request_parses_minimal_envelope() {
    let req = Request::parse(r#"{"id":"m1","type":"PING"}"#).unwrap();
    assert_eq!(req.id, "m1");
    assert_eq!(req.op, "PING");
    assert!(req.payload.is_none());
    assert!(req.timestamp.is_none());
}

#[test]
fn request_parses_full_envelope() {
    let req = Request::parse(
        r#"{"id":"m2","type":"EXPORT_PDF","payload":{"path":"out.pdf"},"timestamp":1700000000000}"#,
    )
    .unwrap();
    assert_eq!(req.payload_or_null(), json!({"path": "out.pdf"}));
    assert_eq!(req.timestamp, Some(1_700_000_000_000));
}

#[yare::parameterized(
    not_json    = { "PING" },
    not_object  = { "[1,2,3]" },
    missing_id  = { r#"{"type":"PING"}"# },
    missing_op  = { r#"{"id":"m1"}"# },
)]
fn malformed_requests_fail_to_parse(line: &str) {
    assert!(Request::parse(line).is_err());
}

#[test]
fn success_response_serializes_without_error_field() {
    let resp = Response::ok("m1", json!({"message": "PONG"}), 42);
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["id"], "m1");
    assert_eq!(json["success"], true);
    assert_eq!(json["result"]["message"], "PONG");
    assert!(json.get("error").is_none());
}

#[test]
fn failure_response_carries_code_and_message() {
    let resp = Response::fail("m2", Fault::unknown_operation("FLY_TO_MOON"), 42);
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "UNKNOWN_OPERATION");
    assert!(json.get("result").is_none());
    assert_eq!(resp.error_code(), Some(ErrorCode::UnknownOperation));
}

#[test]
fn response_round_trips_through_serde() {
    let resp = Response::fail("m3", Fault::validation("empty id"), 7);
    let text = serde_json::to_string(&resp).unwrap();
    let back: Response = serde_json::from_str(&text).unwrap();
    assert_eq!(back, resp);
}
