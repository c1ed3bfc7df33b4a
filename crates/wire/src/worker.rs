// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker subprocess wire protocol.
//!
//! The kernel writes [`WorkerCommand`] lines to a worker's stdin and reads
//! its stdout line by line. Each stdout line is classified by
//! [`WorkerLine::classify`]: the startup ready announcement, a reply to a
//! pending command, or an unsolicited event. Stderr never reaches this
//! module; it is log text by contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to a worker (one JSON line on its stdin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub id: String,
    /// Worker-vocabulary method name (router-rewritten, e.g. `export_pdf`).
    #[serde(alias = "type")]
    pub method: String,
    #[serde(default, alias = "payload", skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl WorkerCommand {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self { id: id.into(), method: method.into(), params }
    }

    /// The shutdown command every worker must honor.
    pub fn shutdown(id: impl Into<String>) -> Self {
        Self::new(id, "SHUTDOWN", None)
    }
}

/// Error half of a worker reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReplyError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Reply from a worker (one JSON line on its stdout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerReplyError>,
}

/// The single announcement a worker emits once its stdio loop is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyAnnouncement {
    /// Always `"READY"` on the wire.
    #[serde(rename = "type")]
    pub kind: String,
    pub engine: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Classified inbound worker stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerLine {
    Ready(ReadyAnnouncement),
    Reply(WorkerReply),
    /// Parseable JSON that is neither a ready announcement nor a reply.
    Event(Value),
    /// Not JSON at all; treated as stray log text.
    Garbage(String),
}

impl WorkerLine {
    pub fn classify(line: &str) -> WorkerLine {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return WorkerLine::Garbage(line.to_string()),
        };
        if value.get("type").and_then(Value::as_str) == Some("READY") {
            if let Ok(ready) = serde_json::from_value::<ReadyAnnouncement>(value.clone()) {
                return WorkerLine::Ready(ready);
            }
        }
        let has_id = value.get("id").and_then(Value::as_str).is_some();
        if has_id && value.get("success").and_then(Value::as_bool).is_some() {
            if let Ok(reply) = serde_json::from_value::<WorkerReply>(value.clone()) {
                return WorkerLine::Reply(reply);
            }
        }
        WorkerLine::Event(value)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
