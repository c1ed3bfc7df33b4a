// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable workflow engine.
//!
//! Definitions are immutable JSON documents; executions are driven step by
//! step with every transition persisted through `clerk-storage` before the
//! next in-memory one. Sequential workflows are executed as a linear chain;
//! definitions whose steps declare dependencies run as DAGs with
//! parallelism across the antichain. Worker access goes through the
//! [`StepRunner`] seam; this crate never touches a subprocess.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dag;
mod definition;
mod engine;
mod runner;
mod template;

pub use dag::DagError;
pub use definition::{
    DefinitionError, OnFailure, RetryPolicy, StepDefinition, StepKind, TimeoutPolicy,
    WorkflowDefinition, WorkflowRegistry,
};
pub use engine::{ApprovalDecision, TriggerBinding, WorkflowEngine};
pub use runner::StepRunner;
pub use template::{resolve_template, TemplateContext};

#[cfg(any(test, feature = "test-support"))]
pub use runner::ScriptedRunner;
