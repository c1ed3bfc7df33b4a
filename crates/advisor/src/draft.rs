// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Draft artifacts: non-executable proposals.
//!
//! Every draft is `status = "draft-only"` forever; the kernel has no code
//! path that applies one. The content hash makes audit rows verifiable
//! against what a caller received.

use clerk_core::DraftId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Enumerated kinds of drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    WorkflowSkeleton,
    StepParameters,
    PolicyConfig,
    DocSnippet,
}

impl DraftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKind::WorkflowSkeleton => "workflow_skeleton",
            DraftKind::StepParameters => "step_parameters",
            DraftKind::PolicyConfig => "policy_config",
            DraftKind::DocSnippet => "doc_snippet",
        }
    }

    pub fn parse(s: &str) -> Option<DraftKind> {
        match s {
            "workflow_skeleton" => Some(DraftKind::WorkflowSkeleton),
            "step_parameters" => Some(DraftKind::StepParameters),
            "policy_config" => Some(DraftKind::PolicyConfig),
            "doc_snippet" => Some(DraftKind::DocSnippet),
            _ => None,
        }
    }
}

/// A generated draft artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub kind: DraftKind,
    /// Always `"draft-only"`.
    pub status: String,
    pub content: Value,
    /// `sha256:<hex>` over the canonical content.
    pub content_hash: String,
    /// Set by the guardrail when the decision was `flag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl Draft {
    pub fn new(kind: DraftKind, content: Value) -> Self {
        let content_hash = hash_content(&content);
        Self {
            id: DraftId::generate(),
            kind,
            status: "draft-only".to_string(),
            content,
            content_hash,
            flag: None,
        }
    }
}

pub(crate) fn hash_content(content: &Value) -> String {
    let canonical = content.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("sha256:{hex}")
}

/// Build the content for a draft of `kind` from caller parameters.
pub(crate) fn build_content(kind: DraftKind, params: &Value) -> Value {
    match kind {
        DraftKind::WorkflowSkeleton => {
            let id = params.get("workflow_id").and_then(Value::as_str).unwrap_or("new-workflow");
            json!({
                "id": id,
                "version": "0.1",
                "steps": [
                    {"id": "step-1", "type": "task", "operation": "PING", "input": {}},
                    {"id": "review", "type": "approval", "prompt": "Review the result?"}
                ]
            })
        }
        DraftKind::StepParameters => {
            let step = params.get("step_id").and_then(Value::as_str).unwrap_or("step-1");
            json!({
                "step_id": step,
                "retry": {"max_attempts": 3, "backoff_ms": 2000},
                "on_failure": "fail"
            })
        }
        DraftKind::PolicyConfig => json!({
            "min_confidence": 0.4,
            "blocked_types": [],
            "max_per_context": 5
        }),
        DraftKind::DocSnippet => {
            let subject = params.get("subject").and_then(Value::as_str).unwrap_or("workflow");
            json!({
                "format": "markdown",
                "text": format!("## {subject}\n\nDescribe what this {subject} does, its inputs, and its approval gates.")
            })
        }
    }
}
