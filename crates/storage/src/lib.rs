// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded relational store for the Clerk kernel.
//!
//! One SQLite file per installation. Service modules add `impl Store`
//! blocks per area (execution history, activity log, contracts, workflow
//! state, advisor audit). Persistence failures on the service layer are
//! fail-soft: logged, neutral value returned, kernel stays available. Only
//! opening the store can abort startup.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod activity;
mod audit;
mod contracts;
mod db;
mod history;
mod workflow;

pub use activity::{Activity, ActivityRecord, Severity};
pub use audit::{DraftAuditRecord, GuardrailAuditRecord, SuggestionAuditRecord};
pub use contracts::{ContractRecord, PaymentStageRecord};
pub use db::{Store, StoreError};
pub use history::{TaskRecord, TaskStatus};
pub use workflow::{
    ApprovalRecord, ApprovalResolution, ExecutionCountStat, ExecutionRecord, ExecutionStatus,
    StepDurationStat, StepExecutionRecord, StepFailureStat, StepStatus,
};
