// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Front-end request/response envelope.
//!
//! One request line yields exactly one response line carrying the same
//! correlation id.

use clerk_core::{ErrorCode, Fault};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound request from the front-end process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed verbatim in the response.
    pub id: String,
    /// Operation name (router whitelist vocabulary).
    #[serde(rename = "type")]
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Client-side epoch milliseconds; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Request {
    pub fn new(id: impl Into<String>, op: impl Into<String>) -> Self {
        Self { id: id.into(), op: op.into(), payload: None, timestamp: None }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Payload or `null` when absent.
    pub fn payload_or_null(&self) -> Value {
        self.payload.clone().unwrap_or(Value::Null)
    }

    /// Parse one request line. Malformed JSON or a non-object is an error;
    /// field-level validation (empty id, empty type) is the gateway's job.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Error half of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
}

/// Outbound response to the front-end process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    /// Server-side epoch milliseconds.
    pub timestamp: i64,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
            timestamp: timestamp as i64,
        }
    }

    pub fn fail(id: impl Into<String>, fault: Fault, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(ResponseError { code: fault.code, message: fault.message }),
            timestamp: timestamp as i64,
        }
    }

    /// Error code when this is a failure response.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
#[path = "frontend_tests.rs"]
mod tests;
