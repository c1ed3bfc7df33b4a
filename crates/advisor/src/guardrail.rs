// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guardrail: the pure policy filter in front of every advisory output.
//!
//! Rules come from a declarative document loaded at start. Evaluation has
//! no side effects; auditing is the caller's job (`AdvisorService`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::draft::DraftKind;
use crate::suggestion::Suggestion;

/// Declarative policy document (`guardrail.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailPolicy {
    /// Suggestions below this confidence are flagged, not blocked.
    pub min_confidence: f64,
    /// Suggestion types and draft kinds that never leave the kernel.
    pub blocked_types: Vec<String>,
    /// Cap on suggestions returned per context.
    pub max_per_context: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { min_confidence: 0.4, blocked_types: Vec::new(), max_per_context: 5 }
    }
}

/// Verdict for one advisory item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Flag { reason: String },
    Block { reason: String },
}

impl GuardrailDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailDecision::Allow => "allow",
            GuardrailDecision::Flag { .. } => "flag",
            GuardrailDecision::Block { .. } => "block",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            GuardrailDecision::Allow => "within policy",
            GuardrailDecision::Flag { reason } | GuardrailDecision::Block { reason } => reason,
        }
    }
}

/// Pure policy evaluator.
pub struct Guardrail {
    policy: GuardrailPolicy,
}

impl Guardrail {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self { policy }
    }

    /// Load `guardrail.json` from the config directory, falling back to
    /// defaults when absent or malformed.
    pub fn load(path: &Path) -> Self {
        let policy = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(policy) => {
                    info!(path = %path.display(), "guardrail policy loaded");
                    policy
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid guardrail policy, using defaults");
                    GuardrailPolicy::default()
                }
            },
            Err(_) => GuardrailPolicy::default(),
        };
        Self::new(policy)
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    pub fn evaluate(&self, suggestion: &Suggestion) -> GuardrailDecision {
        let type_name = suggestion.suggestion_type.as_str();
        if self.policy.blocked_types.iter().any(|t| t == type_name) {
            return GuardrailDecision::Block {
                reason: format!("suggestion type '{type_name}' is deny-listed"),
            };
        }
        if suggestion.confidence < self.policy.min_confidence {
            return GuardrailDecision::Flag {
                reason: format!(
                    "confidence {:.2} below threshold {:.2}",
                    suggestion.confidence, self.policy.min_confidence
                ),
            };
        }
        GuardrailDecision::Allow
    }

    pub fn evaluate_draft(&self, kind: DraftKind) -> GuardrailDecision {
        let kind_name = kind.as_str();
        if self.policy.blocked_types.iter().any(|t| t == kind_name) {
            return GuardrailDecision::Block {
                reason: format!("draft kind '{kind_name}' is deny-listed"),
            };
        }
        GuardrailDecision::Allow
    }

    /// Context cap applied after per-item screening.
    pub fn max_per_context(&self) -> usize {
        self.policy.max_per_context
    }
}

#[cfg(test)]
#[path = "guardrail_tests.rs"]
mod tests;
