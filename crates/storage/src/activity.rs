// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured activity log.
//!
//! Security events, worker lifecycle, workflow transitions, and approval
//! resolutions all land here. Writes are fail-soft.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Security,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Security => "security",
            Severity::Error => "error",
        }
    }

    fn parse(s: &str) -> Severity {
        match s {
            "info" => Severity::Info,
            "warning" => Severity::Warning,
            "security" => Severity::Security,
            _ => Severity::Error,
        }
    }
}

/// A loggable activity, built by the caller.
#[derive(Debug, Clone)]
pub struct Activity {
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub severity: Severity,
    pub module: Option<String>,
    pub message: String,
    pub metadata: Option<Value>,
}

impl Activity {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity_type: None,
            entity_id: None,
            severity: Severity::Info,
            module: None,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One persisted `activity_log` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub timestamp: u64,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub severity: Severity,
    pub module: Option<String>,
    pub message: Option<String>,
    pub metadata: Option<Value>,
}

impl ActivityRecord {
    /// Timestamp rendered as RFC 3339 for display surfaces.
    pub fn timestamp_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp as i64)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    let metadata: Option<String> = row.get(8)?;
    Ok(ActivityRecord {
        id: row.get(0)?,
        timestamp: row.get::<_, i64>(1)? as u64,
        action: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        severity: Severity::parse(&row.get::<_, String>(5)?),
        module: row.get(6)?,
        message: row.get(7)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

const ACTIVITY_COLUMNS: &str =
    "id, timestamp, action, entity_type, entity_id, severity, module, short_message, metadata";

impl Store {
    pub fn log_activity(&self, activity: &Activity, timestamp: u64) {
        self.soft("log_activity", 0, |conn| {
            conn.execute(
                "INSERT INTO activity_log \
                 (timestamp, action, entity_type, entity_id, severity, module, short_message, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    timestamp as i64,
                    activity.action,
                    activity.entity_type,
                    activity.entity_id,
                    activity.severity.as_str(),
                    activity.module,
                    activity.message,
                    activity.metadata.as_ref().map(Value::to_string),
                ],
            )
        });
    }

    /// Most recent activity rows, newest first.
    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityRecord> {
        self.soft("recent_activity", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activity_log ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map([limit as i64], activity_from_row)?;
            rows.collect()
        })
    }

    pub fn activity_by_action(&self, action: &str, limit: usize) -> Vec<ActivityRecord> {
        self.soft("activity_by_action", Vec::new(), |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activity_log \
                 WHERE action = ?1 ORDER BY id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![action, limit as i64], activity_from_row)?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let activity = Activity::new("worker.started", "python worker is ready")
            .entity("worker", "python")
            .module("supervisor")
            .metadata(json!({"capabilities": 12}));
        store.log_activity(&activity, 777);

        let rows = store.recent_activity(5);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.timestamp, 777);
        assert_eq!(row.action, "worker.started");
        assert_eq!(row.entity_id.as_deref(), Some("python"));
        assert_eq!(row.severity, Severity::Info);
        assert_eq!(row.metadata, Some(json!({"capabilities": 12})));
    }

    #[test]
    fn timestamp_renders_as_rfc3339() {
        let store = Store::open_in_memory().unwrap();
        store.log_activity(&Activity::new("a", "m"), 1_700_000_000_000);
        let rows = store.recent_activity(1);
        assert!(rows[0].timestamp_rfc3339().starts_with("2023-11-14T"));
    }

    #[test]
    fn filter_by_action() {
        let store = Store::open_in_memory().unwrap();
        store.log_activity(&Activity::new("gateway.rejected", "bad path").severity(Severity::Security), 1);
        store.log_activity(&Activity::new("worker.started", "ok"), 2);

        let rejected = store.activity_by_action("gateway.rejected", 10);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].severity, Severity::Security);
    }
}
