// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-graph validation and bookkeeping.
//!
//! Validation runs Kahn's algorithm to fixed point; anything left over is
//! on a cycle. Execution-time bookkeeping (in-degrees, dependents,
//! transitive closure) lives here too so both the engine and resume share
//! one implementation.

use std::collections::HashMap;

use thiserror::Error;

use crate::definition::WorkflowDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("step '{step}' depends on itself")]
    SelfDependency { step: String },

    #[error("dependency cycle involving steps: {steps:?}")]
    Cycle { steps: Vec<String> },
}

/// Validate the dependency graph of a definition.
pub fn validate(def: &WorkflowDefinition) -> Result<(), DagError> {
    for step in &def.steps {
        for dep in &step.depends_on {
            if dep == &step.id {
                return Err(DagError::SelfDependency { step: step.id.clone() });
            }
            if def.step(dep).is_none() {
                return Err(DagError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // Kahn to fixed point: repeatedly remove zero-in-degree nodes.
    let mut indegree = indegrees(def);
    let dependents = dependents(def);
    let mut queue: Vec<&str> =
        indegree.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();
    let mut removed = 0usize;
    while let Some(id) = queue.pop() {
        removed += 1;
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(dependent.as_str()) {
                *d -= 1;
                if *d == 0 {
                    queue.push(dependent);
                }
            }
        }
    }
    if removed < def.steps.len() {
        let mut cyclic: Vec<String> = indegree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| (*id).to_string())
            .collect();
        cyclic.sort();
        return Err(DagError::Cycle { steps: cyclic });
    }
    Ok(())
}

/// In-degree (number of declared dependencies) per step id.
pub fn indegrees(def: &WorkflowDefinition) -> HashMap<&str, usize> {
    def.steps.iter().map(|s| (s.id.as_str(), s.depends_on.len())).collect()
}

/// Reverse edges: step id → steps that depend on it.
pub fn dependents(def: &WorkflowDefinition) -> HashMap<&str, Vec<String>> {
    let mut map: HashMap<&str, Vec<String>> =
        def.steps.iter().map(|s| (s.id.as_str(), Vec::new())).collect();
    for step in &def.steps {
        for dep in &step.depends_on {
            if let Some(list) = map.get_mut(dep.as_str()) {
                list.push(step.id.clone());
            }
        }
    }
    map
}

/// Every step reachable downstream of `from` (excluding `from` itself).
pub fn transitive_dependents(def: &WorkflowDefinition, from: &str) -> Vec<String> {
    let dependents = dependents(def);
    let mut out = Vec::new();
    let mut stack: Vec<&str> = vec![from];
    let mut seen = std::collections::HashSet::new();
    while let Some(id) = stack.pop() {
        for dependent in dependents.get(id).into_iter().flatten() {
            if seen.insert(dependent.as_str().to_string()) {
                out.push(dependent.clone());
                stack.push(dependent);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
