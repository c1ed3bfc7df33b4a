// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow durability: execution, step, and approval rows.
//!
//! The engine persists every transition before the next in-memory one, so
//! these rows are the source of truth for resume-after-restart. Step rows
//! are keyed `(execution_id, step_id)` and upserted: a step that re-enters
//! execution after a crash reuses its row.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Store;

/// Workflow execution lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    PausedForApproval,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::PausedForApproval => "paused_for_approval",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> ExecutionStatus {
        match s {
            "running" => ExecutionStatus::Running,
            "paused" => ExecutionStatus::Paused,
            "paused_for_approval" => ExecutionStatus::PausedForApproval,
            "completed" => ExecutionStatus::Completed,
            _ => ExecutionStatus::Failed,
        }
    }

    /// True once the execution can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Step execution lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> StepStatus {
        match s {
            "running" => StepStatus::Running,
            "completed" => StepStatus::Completed,
            "skipped" => StepStatus::Skipped,
            _ => StepStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Running)
    }
}

/// One `workflow_execution` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: u64,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
    /// Initial context the execution started with (opaque JSON).
    pub context: Value,
}

/// One `workflow_step_execution` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionRecord {
    pub id: i64,
    pub execution_id: String,
    pub step_id: String,
    pub step_type: String,
    pub status: StepStatus,
    pub retry_count: u32,
    pub started_at: u64,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
    /// Step result, persisted for resume (completed steps only).
    pub result: Option<Value>,
}

/// One `workflow_approval` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: i64,
    pub execution_id: String,
    pub step_id: String,
    pub prompt: String,
    pub allowed_actions: Vec<String>,
    pub decision: Option<String>,
    pub actor_id: Option<String>,
    pub comment: Option<String>,
    pub requested_at: u64,
    pub resolved_at: Option<u64>,
}

/// Outcome of the compare-and-set approval resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResolution {
    Resolved,
    AlreadyResolved,
    NotFound,
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let context: Option<String> = row.get(7)?;
    Ok(ExecutionRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        workflow_id: row.get(2)?,
        status: ExecutionStatus::parse(&row.get::<_, String>(3)?),
        started_at: row.get::<_, i64>(4)? as u64,
        completed_at: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        error_message: row.get(6)?,
        context: context.and_then(|c| serde_json::from_str(&c).ok()).unwrap_or(Value::Null),
    })
}

fn step_from_row(row: &Row<'_>) -> rusqlite::Result<StepExecutionRecord> {
    let result: Option<String> = row.get(9)?;
    Ok(StepExecutionRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        step_id: row.get(2)?,
        step_type: row.get(3)?,
        status: StepStatus::parse(&row.get::<_, String>(4)?),
        retry_count: row.get::<_, i64>(5)? as u32,
        started_at: row.get::<_, i64>(6)? as u64,
        completed_at: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        error_message: row.get(8)?,
        result: result.and_then(|r| serde_json::from_str(&r).ok()),
    })
}

fn approval_from_row(row: &Row<'_>) -> rusqlite::Result<ApprovalRecord> {
    let allowed: String = row.get(4)?;
    Ok(ApprovalRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        step_id: row.get(2)?,
        prompt: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        allowed_actions: allowed.split(',').map(str::to_string).filter(|s| !s.is_empty()).collect(),
        decision: row.get(5)?,
        actor_id: row.get(6)?,
        comment: row.get(7)?,
        requested_at: row.get::<_, i64>(8)? as u64,
        resolved_at: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
    })
}

const EXECUTION_COLUMNS: &str =
    "id, execution_id, workflow_id, status, started_at, completed_at, error_message, context";
const STEP_COLUMNS: &str = "id, execution_id, step_id, step_type, status, retry_count, \
                            started_at, completed_at, error_message, result";
const APPROVAL_COLUMNS: &str = "id, execution_id, step_id, prompt, allowed_actions, decision, \
                                actor_id, comment, requested_at, resolved_at";

/// Aggregate: failures per (workflow, step), for the advisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailureStat {
    pub workflow_id: String,
    pub step_id: String,
    pub failures: u64,
    pub attempts: u64,
}

/// Aggregate: average completed-step duration, for the advisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDurationStat {
    pub workflow_id: String,
    pub step_id: String,
    pub avg_ms: f64,
    pub runs: u64,
}

/// Aggregate: executions per workflow, for the advisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionCountStat {
    pub workflow_id: String,
    pub total: u64,
    pub failed: u64,
}

impl Store {
    /// Persist a new execution in `running`. Returns false on failure.
    pub fn execution_insert(
        &self,
        execution_id: &str,
        workflow_id: &str,
        context: &Value,
        started_at: u64,
    ) -> bool {
        self.soft("execution_insert", false, |conn| {
            conn.execute(
                "INSERT INTO workflow_execution \
                 (execution_id, workflow_id, status, started_at, context) \
                 VALUES (?1, ?2, 'running', ?3, ?4)",
                params![execution_id, workflow_id, started_at as i64, context.to_string()],
            )?;
            Ok(true)
        })
    }

    pub fn execution_set_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error_message: Option<&str>,
        completed_at: Option<u64>,
    ) -> bool {
        self.soft("execution_set_status", false, |conn| {
            let n = conn.execute(
                "UPDATE workflow_execution \
                 SET status = ?2, error_message = COALESCE(?3, error_message), \
                     completed_at = COALESCE(?4, completed_at) \
                 WHERE execution_id = ?1",
                params![
                    execution_id,
                    status.as_str(),
                    error_message,
                    completed_at.map(|v| v as i64)
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn execution_by_id(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.soft("execution_by_id", None, |conn| {
            conn.query_row(
                &format!("SELECT {EXECUTION_COLUMNS} FROM workflow_execution WHERE execution_id = ?1"),
                [execution_id],
                execution_from_row,
            )
            .optional()
        })
    }

    /// All executions whose status is in `statuses` (resume frontier).
    pub fn executions_with_status(&self, statuses: &[ExecutionStatus]) -> Vec<ExecutionRecord> {
        self.soft("executions_with_status", Vec::new(), |conn| {
            let placeholders =
                statuses.iter().enumerate().map(|(i, _)| format!("?{}", i + 1)).collect::<Vec<_>>().join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM workflow_execution \
                 WHERE status IN ({placeholders}) ORDER BY id"
            ))?;
            let bound: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            let rows = stmt.query_map(rusqlite::params_from_iter(bound), execution_from_row)?;
            rows.collect()
        })
    }

    pub fn recent_executions(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.soft("recent_executions", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM workflow_execution ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map([limit as i64], execution_from_row)?;
            rows.collect()
        })
    }

    /// Open (or reopen after crash) a step row in `running`.
    pub fn step_begin(
        &self,
        execution_id: &str,
        step_id: &str,
        step_type: &str,
        retry_count: u32,
        started_at: u64,
    ) -> bool {
        self.soft("step_begin", false, |conn| {
            conn.execute(
                "INSERT INTO workflow_step_execution \
                 (execution_id, step_id, step_type, status, retry_count, started_at) \
                 VALUES (?1, ?2, ?3, 'running', ?4, ?5) \
                 ON CONFLICT(execution_id, step_id) DO UPDATE SET \
                     status = 'running', retry_count = ?4, started_at = ?5, \
                     completed_at = NULL, error_message = NULL",
                params![execution_id, step_id, step_type, retry_count as i64, started_at as i64],
            )?;
            Ok(true)
        })
    }

    /// Transition a step to a terminal status. The result is persisted only
    /// for `completed` so resume can rebuild the cache.
    pub fn step_finish(
        &self,
        execution_id: &str,
        step_id: &str,
        status: StepStatus,
        result: Option<&Value>,
        error_message: Option<&str>,
        completed_at: u64,
    ) -> bool {
        self.soft("step_finish", false, |conn| {
            let n = conn.execute(
                "UPDATE workflow_step_execution \
                 SET status = ?3, result = ?4, error_message = ?5, completed_at = ?6 \
                 WHERE execution_id = ?1 AND step_id = ?2",
                params![
                    execution_id,
                    step_id,
                    status.as_str(),
                    result.map(Value::to_string),
                    error_message,
                    completed_at as i64
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn step_set_retry(&self, execution_id: &str, step_id: &str, retry_count: u32) {
        self.soft("step_set_retry", 0, |conn| {
            conn.execute(
                "UPDATE workflow_step_execution SET retry_count = ?3 \
                 WHERE execution_id = ?1 AND step_id = ?2",
                params![execution_id, step_id, retry_count as i64],
            )
        });
    }

    pub fn steps_for_execution(&self, execution_id: &str) -> Vec<StepExecutionRecord> {
        self.soft("steps_for_execution", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STEP_COLUMNS} FROM workflow_step_execution \
                 WHERE execution_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map([execution_id], step_from_row)?;
            rows.collect()
        })
    }

    /// Persist a pending approval (decision NULL). False if the row could
    /// not be written or already exists.
    pub fn approval_insert(
        &self,
        execution_id: &str,
        step_id: &str,
        prompt: &str,
        allowed_actions: &[String],
        requested_at: u64,
    ) -> bool {
        self.soft("approval_insert", false, |conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO workflow_approval \
                 (execution_id, step_id, prompt, allowed_actions, requested_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![execution_id, step_id, prompt, allowed_actions.join(","), requested_at as i64],
            )?;
            Ok(n == 1)
        })
    }

    /// Resolve an approval exactly once: compare-and-set on `decision IS
    /// NULL`, so concurrent resolutions serialize in the store.
    pub fn approval_resolve(
        &self,
        execution_id: &str,
        step_id: &str,
        decision: &str,
        actor_id: &str,
        comment: Option<&str>,
        resolved_at: u64,
    ) -> ApprovalResolution {
        self.soft("approval_resolve", ApprovalResolution::NotFound, |conn| {
            let n = conn.execute(
                "UPDATE workflow_approval \
                 SET decision = ?3, actor_id = ?4, comment = ?5, resolved_at = ?6 \
                 WHERE execution_id = ?1 AND step_id = ?2 AND decision IS NULL",
                params![execution_id, step_id, decision, actor_id, comment, resolved_at as i64],
            )?;
            if n == 1 {
                return Ok(ApprovalResolution::Resolved);
            }
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM workflow_approval WHERE execution_id = ?1 AND step_id = ?2",
                    params![execution_id, step_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(if exists.is_some() {
                ApprovalResolution::AlreadyResolved
            } else {
                ApprovalResolution::NotFound
            })
        })
    }

    pub fn pending_approvals(&self) -> Vec<ApprovalRecord> {
        self.soft("pending_approvals", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPROVAL_COLUMNS} FROM workflow_approval \
                 WHERE decision IS NULL ORDER BY requested_at"
            ))?;
            let rows = stmt.query_map([], approval_from_row)?;
            rows.collect()
        })
    }

    pub fn approval_for_step(&self, execution_id: &str, step_id: &str) -> Option<ApprovalRecord> {
        self.soft("approval_for_step", None, |conn| {
            conn.query_row(
                &format!(
                    "SELECT {APPROVAL_COLUMNS} FROM workflow_approval \
                     WHERE execution_id = ?1 AND step_id = ?2"
                ),
                params![execution_id, step_id],
                approval_from_row,
            )
            .optional()
        })
    }

    // --- advisor aggregates ---

    pub fn step_failure_stats(&self) -> Vec<StepFailureStat> {
        self.soft("step_failure_stats", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT we.workflow_id, se.step_id, \
                        SUM(CASE WHEN se.status = 'failed' THEN 1 ELSE 0 END), COUNT(*) \
                 FROM workflow_step_execution se \
                 JOIN workflow_execution we ON we.execution_id = se.execution_id \
                 GROUP BY we.workflow_id, se.step_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(StepFailureStat {
                    workflow_id: row.get(0)?,
                    step_id: row.get(1)?,
                    failures: row.get::<_, i64>(2)? as u64,
                    attempts: row.get::<_, i64>(3)? as u64,
                })
            })?;
            rows.collect()
        })
    }

    pub fn step_duration_stats(&self) -> Vec<StepDurationStat> {
        self.soft("step_duration_stats", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT we.workflow_id, se.step_id, \
                        AVG(se.completed_at - se.started_at), COUNT(*) \
                 FROM workflow_step_execution se \
                 JOIN workflow_execution we ON we.execution_id = se.execution_id \
                 WHERE se.status = 'completed' AND se.completed_at IS NOT NULL \
                 GROUP BY we.workflow_id, se.step_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(StepDurationStat {
                    workflow_id: row.get(0)?,
                    step_id: row.get(1)?,
                    avg_ms: row.get::<_, f64>(2)?,
                    runs: row.get::<_, i64>(3)? as u64,
                })
            })?;
            rows.collect()
        })
    }

    pub fn execution_counts(&self) -> Vec<ExecutionCountStat> {
        self.soft("execution_counts", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT workflow_id, COUNT(*), \
                        SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) \
                 FROM workflow_execution GROUP BY workflow_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ExecutionCountStat {
                    workflow_id: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                    failed: row.get::<_, i64>(2)? as u64,
                })
            })?;
            rows.collect()
        })
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
