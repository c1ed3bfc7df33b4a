// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Front-end protocol scenarios.

use super::helpers::kernel;
use clerk_core::ErrorCode;
use clerk_wire::Request;
use serde_json::json;

#[tokio::test]
async fn echo_round_trip() {
    let k = kernel();
    let response = k.request(Request::new("m1", "PING")).await;

    assert_eq!(response.id, "m1");
    assert!(response.success);
    assert_eq!(response.result.as_ref().unwrap()["message"], "PONG");
    assert!(response.error.is_none());
}

#[tokio::test]
async fn unknown_operation_reports_unknown_operation() {
    let k = kernel();
    let response = k.request(Request::new("m2", "FLY_TO_MOON")).await;

    assert_eq!(response.id, "m2");
    assert!(!response.success);
    assert_eq!(response.error_code(), Some(ErrorCode::UnknownOperation));
    assert!(response.result.is_none());
}

#[tokio::test]
async fn rejected_paths_never_reach_dispatch() {
    let k = kernel();
    let response = k
        .request(
            Request::new("m3", "PDF_MERGE")
                .with_payload(json!({"inputs": ["../../etc/shadow.pdf"], "output": "out.pdf"})),
        )
        .await;
    assert_eq!(response.error_code(), Some(ErrorCode::ValidationFailed));

    // No task was scheduled, no history row written.
    assert!(k.store.recent_tasks(10).is_empty());
    // The rejection is on the security log.
    assert_eq!(k.store.activity_by_action("gateway.rejected", 10).len(), 1);
}

#[tokio::test]
async fn every_accepted_request_gets_exactly_one_response() {
    let k = kernel();
    let ids = ["a", "b", "c", "d", "e"];
    let mut responses = Vec::new();
    for id in ids {
        responses.push(k.request(Request::new(id, "PING")).await);
    }
    for (id, response) in ids.iter().zip(&responses) {
        assert_eq!(&response.id, id);
        assert!(response.success);
    }
}
