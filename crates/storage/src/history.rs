// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution history: one row per scheduled task.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::Store;

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> TaskStatus {
        match s {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }
}

/// One `execution_history` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub operation_type: String,
    /// Worker that executed the task (`python`, `network`, `native`).
    pub module: String,
    pub started_at: u64,
    pub completed_at: Option<u64>,
    pub status: TaskStatus,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub error_message: Option<String>,
    pub contract_id: Option<i64>,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        operation_type: row.get(1)?,
        module: row.get(2)?,
        started_at: row.get::<_, i64>(3)? as u64,
        completed_at: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        status: TaskStatus::parse(&row.get::<_, String>(5)?),
        input_summary: row.get(6)?,
        output_summary: row.get(7)?,
        error_message: row.get(8)?,
        contract_id: row.get(9)?,
    })
}

const TASK_COLUMNS: &str = "id, operation_type, module, started_at, completed_at, status, \
                            input_summary, output_summary, error_message, contract_id";

impl Store {
    /// Open a history row in `pending`. Returns the row id, or −1 on
    /// persistence failure.
    pub fn task_begin(
        &self,
        operation_type: &str,
        module: &str,
        input_summary: Option<&str>,
        contract_id: Option<i64>,
        started_at: u64,
    ) -> i64 {
        self.soft("task_begin", -1, |conn| {
            conn.execute(
                "INSERT INTO execution_history \
                 (operation_type, module, started_at, status, input_summary, contract_id) \
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
                params![operation_type, module, started_at as i64, input_summary, contract_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn task_running(&self, id: i64) {
        self.soft("task_running", 0, |conn| {
            conn.execute("UPDATE execution_history SET status = 'running' WHERE id = ?1", [id])
        });
    }

    pub fn task_completed(&self, id: i64, output_summary: Option<&str>, completed_at: u64) {
        self.soft("task_completed", 0, |conn| {
            conn.execute(
                "UPDATE execution_history \
                 SET status = 'completed', output_summary = ?2, completed_at = ?3 \
                 WHERE id = ?1",
                params![id, output_summary, completed_at as i64],
            )
        });
    }

    pub fn task_failed(&self, id: i64, error_message: &str, completed_at: u64) {
        self.soft("task_failed", 0, |conn| {
            conn.execute(
                "UPDATE execution_history \
                 SET status = 'failed', error_message = ?2, completed_at = ?3 \
                 WHERE id = ?1",
                params![id, error_message, completed_at as i64],
            )
        });
    }

    /// Most recent tasks, newest first.
    pub fn recent_tasks(&self, limit: usize) -> Vec<TaskRecord> {
        self.soft("recent_tasks", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM execution_history ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map([limit as i64], task_from_row)?;
            rows.collect()
        })
    }

    pub fn tasks_with_status(&self, status: TaskStatus, limit: usize) -> Vec<TaskRecord> {
        self.soft("tasks_with_status", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM execution_history \
                 WHERE status = ?1 ORDER BY id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status.as_str(), limit as i64], task_from_row)?;
            rows.collect()
        })
    }

    /// Delete history rows started before `cutoff`. Returns rows removed.
    pub fn prune_history_before(&self, cutoff: u64) -> usize {
        self.soft("prune_history_before", 0, |conn| {
            conn.execute("DELETE FROM execution_history WHERE started_at < ?1", [cutoff as i64])
        })
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
