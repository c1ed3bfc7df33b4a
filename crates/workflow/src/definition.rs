// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definitions.
//!
//! A definition is parsed once, validated, and never mutated afterwards.
//! Step kinds are a closed tagged enum; new kinds extend the tag, not a
//! class hierarchy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::dag::{self, DagError};

/// Errors from loading or validating a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("workflow '{workflow}' has no steps")]
    Empty { workflow: String },

    #[error("workflow '{workflow}' declares step '{step}' more than once")]
    DuplicateStep { workflow: String, step: String },

    #[error("workflow '{workflow}': {source}")]
    Graph {
        workflow: String,
        #[source]
        source: DagError,
    },
}

/// What a step does. Closed set; extend by adding a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Dispatch `operation` to a worker and await its result.
    Task {
        operation: String,
        #[serde(default)]
        input: Value,
    },
    /// Park the execution until a human resolves the approval.
    Approval {
        prompt: String,
        #[serde(default = "default_allowed_decisions")]
        allowed_decisions: Vec<String>,
    },
}

fn default_allowed_decisions() -> Vec<String> {
    vec!["APPROVE".to_string(), "REJECT".to_string()]
}

impl StepKind {
    /// Wire/row name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Task { .. } => "task",
            StepKind::Approval { .. } => "approval",
        }
    }
}

/// Retry behavior for task steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. 1 disables retries.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1, backoff_ms: 0 }
    }
}

/// What a step failure does to the rest of the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Fail the whole workflow.
    #[default]
    Fail,
    /// Record the failure, mark the step skipped, keep going.
    Skip,
}

/// Approval wait bound. Parsed and persisted; the `fail` branch is not
/// enforced by a timer in this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    #[default]
    Wait,
    Fail,
}

/// One step of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique within the workflow.
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub on_failure: OnFailure,
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    /// Explicit dependencies; any non-empty list makes the workflow a DAG.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// An immutable workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub version: String,
    /// Cap on concurrently running DAG steps; None is unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<usize>,
    /// Named variables usable from input templates (`${name}`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, Value>,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Parse and validate a definition from JSON text.
    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        let def: WorkflowDefinition = serde_json::from_str(text)
            .map_err(|source| DefinitionError::Parse { path: "<inline>".to_string(), source })?;
        def.validate()?;
        Ok(def)
    }

    /// True when any step declares dependencies.
    pub fn is_dag(&self) -> bool {
        self.steps.iter().any(|s| !s.depends_on.is_empty())
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps keyed by id, preserving declaration order.
    pub fn step_index(&self) -> IndexMap<&str, &StepDefinition> {
        self.steps.iter().map(|s| (s.id.as_str(), s)).collect()
    }

    /// Structural validation: non-empty, unique step ids, and a valid
    /// dependency graph (existing references, no self-edge, no cycle).
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty { workflow: self.id.clone() });
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStep {
                    workflow: self.id.clone(),
                    step: step.id.clone(),
                });
            }
        }
        dag::validate(self)
            .map_err(|source| DefinitionError::Graph { workflow: self.id.clone(), source })
    }
}

/// In-memory set of loaded definitions.
///
/// Definitions ship as `*.json` documents in the workflows directory and
/// are loaded once at kernel start.
#[derive(Default)]
pub struct WorkflowRegistry {
    defs: Mutex<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` definition under `dir`. Invalid documents are
    /// logged and skipped; a broken definition must not block startup.
    /// Returns the number of definitions loaded.
    pub fn load_dir(&self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                info!(dir = %dir.display(), error = %e, "no workflow directory, starting empty");
                return 0;
            }
        };
        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_file(&path) {
                Ok(def) => {
                    info!(workflow = %def.id, path = %path.display(), "workflow definition loaded");
                    self.insert(def);
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid workflow definition"),
            }
        }
        loaded
    }

    pub fn insert(&self, def: WorkflowDefinition) {
        self.defs.lock().insert(def.id.clone(), Arc::new(def));
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.defs.lock().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.defs.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn load_file(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let def: WorkflowDefinition =
        serde_json::from_str(&text).map_err(|source| DefinitionError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    def.validate()?;
    Ok(def)
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
