// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-facing error taxonomy.
//!
//! Every failure that leaves the kernel is folded into one [`ErrorCode`].
//! Internal errors stay typed (thiserror enums per crate) until they cross
//! the response boundary, where they become a [`Fault`].

use serde::{Deserialize, Serialize};

/// Closed set of error codes carried in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownOperation,
    ValidationFailed,
    QueueFull,
    SchedulerStopped,
    EngineUnavailable,
    EngineError,
    Timeout,
    WorkflowNotFound,
    ApprovalAlreadyResolved,
    ApprovalNotFound,
    PolicyBlocked,
    NotImplemented,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::QueueFull => "QUEUE_FULL",
            ErrorCode::SchedulerStopped => "SCHEDULER_STOPPED",
            ErrorCode::EngineUnavailable => "ENGINE_UNAVAILABLE",
            ErrorCode::EngineError => "ENGINE_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::WorkflowNotFound => "WORKFLOW_NOT_FOUND",
            ErrorCode::ApprovalAlreadyResolved => "APPROVAL_ALREADY_RESOLVED",
            ErrorCode::ApprovalNotFound => "APPROVAL_NOT_FOUND",
            ErrorCode::PolicyBlocked => "POLICY_BLOCKED",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized failure ready to be surfaced to a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Fault {
    pub code: ErrorCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn unknown_operation(op: &str) -> Self {
        Self::new(ErrorCode::UnknownOperation, format!("unknown operation: {op}"))
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn engine_unavailable(worker: &str) -> Self {
        Self::new(ErrorCode::EngineUnavailable, format!("worker '{worker}' is not available"))
    }

    pub fn engine_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EngineError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotImplemented, message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
