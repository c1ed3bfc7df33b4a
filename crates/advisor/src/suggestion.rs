// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suggestion model.

use clerk_core::SuggestionId;
use serde::{Deserialize, Serialize};

/// Kinds of suggestions the advisor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    RetryPolicy,
    StepTimeout,
    ApprovalBottleneck,
    UnusedWorkflow,
    WorkflowReliability,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::RetryPolicy => "retry_policy",
            SuggestionType::StepTimeout => "step_timeout",
            SuggestionType::ApprovalBottleneck => "approval_bottleneck",
            SuggestionType::UnusedWorkflow => "unused_workflow",
            SuggestionType::WorkflowReliability => "workflow_reliability",
        }
    }
}

/// Discrete rendering of a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Bucket a score in [0, 1].
    pub fn from_score(score: f64) -> ConfidenceLevel {
        if score < 0.45 {
            ConfidenceLevel::Low
        } else if score < 0.75 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

/// Why the advisor believes the suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub reasoning: Vec<String>,
    /// References into the evidence (history rows, aggregates).
    pub evidence: Vec<String>,
}

/// What the advisor could not know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limitations {
    pub assumptions: Vec<String>,
    pub missing_data: Vec<String>,
}

/// One advisory suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    /// What the suggestion is about, e.g. `workflow:invoice-export`.
    pub context: String,
    pub title: String,
    pub message: String,
    /// Score in [0, 1]; `level` is its discrete bucket.
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub explanation: Explanation,
    #[serde(default)]
    pub limitations: Limitations,
    /// Set by the guardrail when the decision was `flag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl Suggestion {
    pub fn new(
        suggestion_type: SuggestionType,
        context: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        confidence: f64,
        explanation: Explanation,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            id: SuggestionId::generate(),
            suggestion_type,
            context: context.into(),
            title: title.into(),
            message: message.into(),
            confidence,
            level: ConfidenceLevel::from_score(confidence),
            explanation,
            limitations: Limitations::default(),
            flag: None,
        }
    }

    pub fn with_limitations(mut self, limitations: Limitations) -> Self {
        self.limitations = limitations;
        self
    }
}
