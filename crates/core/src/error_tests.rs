// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    unknown_operation = { ErrorCode::UnknownOperation, "UNKNOWN_OPERATION" },
    validation_failed = { ErrorCode::ValidationFailed, "VALIDATION_FAILED" },
    queue_full        = { ErrorCode::QueueFull, "QUEUE_FULL" },
    scheduler_stopped = { ErrorCode::SchedulerStopped, "SCHEDULER_STOPPED" },
    internal_error    = { ErrorCode::InternalError, "INTERNAL_ERROR" },
    already_resolved  = { ErrorCode::ApprovalAlreadyResolved, "APPROVAL_ALREADY_RESOLVED" },
)]
fn code_serializes_to_wire_form(code: ErrorCode, wire: &str) {
    assert_eq!(code.as_str(), wire);
    let json = serde_json::to_string(&code).unwrap();
    assert_eq!(json, format!("\"{wire}\""));
}

#[test]
fn code_deserializes_from_wire_form() {
    let code: ErrorCode = serde_json::from_str("\"ENGINE_UNAVAILABLE\"").unwrap();
    assert_eq!(code, ErrorCode::EngineUnavailable);
}

#[test]
fn fault_displays_code_and_message() {
    let fault = Fault::timeout("worker python did not respond within 30s");
    assert_eq!(fault.to_string(), "TIMEOUT: worker python did not respond within 30s");
}

#[test]
fn fault_constructors_set_codes() {
    assert_eq!(Fault::validation("x").code, ErrorCode::ValidationFailed);
    assert_eq!(Fault::unknown_operation("FLY_TO_MOON").code, ErrorCode::UnknownOperation);
    assert_eq!(Fault::engine_unavailable("native").code, ErrorCode::EngineUnavailable);
    assert_eq!(Fault::internal("bug").code, ErrorCode::InternalError);
}
