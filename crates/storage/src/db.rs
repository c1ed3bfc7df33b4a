// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle, schema creation, and additive migrations.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from opening or transacting against the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the embedded database. Cheaply shareable behind `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
}

/// Columns added after the initial schema shipped. Each entry is attempted
/// on every open; the "duplicate column name" error means the column is
/// already there and is ignored.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("execution_history", "contract_id", "INTEGER"),
    ("workflow_execution", "context", "TEXT"),
    ("workflow_step_execution", "result", "TEXT"),
    ("workflow_approval", "comment", "TEXT"),
    ("ai_suggestion_audit", "level", "TEXT"),
];

impl Store {
    /// Open (or create) the store at `path`, creating parent directories,
    /// the schema, and running additive migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::initialize(conn)?;
        info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        for (table, column, decl) in ADDITIVE_COLUMNS {
            add_column(&conn, table, column, decl)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` inside a deferred transaction: commit on `Ok`, roll back on
    /// `Err` (the transaction rolls back on drop).
    pub fn with_txn<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock();
        let txn = conn.transaction()?;
        let value = f(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Borrow the raw connection for a single statement.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    /// Fail-soft wrapper: log the error and fall back to `neutral`.
    pub(crate) fn soft<T>(
        &self,
        what: &str,
        neutral: T,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> T {
        match self.with_conn(f) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, what, "persistence failed, continuing");
                neutral
            }
        }
    }
}

fn add_column(conn: &Connection, table: &str, column: &str, decl: &str) -> rusqlite::Result<()> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => {
            info!(table, column, "schema migrated");
            Ok(())
        }
        Err(e) if e.to_string().contains("duplicate column name") => Ok(()),
        Err(e) => Err(e),
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS execution_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_type TEXT NOT NULL,
    module TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    status TEXT NOT NULL,
    input_summary TEXT,
    output_summary TEXT,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_history_status ON execution_history(status);
CREATE INDEX IF NOT EXISTS idx_history_started ON execution_history(started_at);

CREATE TABLE IF NOT EXISTS activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    action TEXT NOT NULL,
    entity_type TEXT,
    entity_id TEXT,
    severity TEXT NOT NULL,
    module TEXT,
    short_message TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp);

CREATE TABLE IF NOT EXISTS contracts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_number TEXT NOT NULL,
    client_name TEXT,
    data TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS payment_stages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id INTEGER NOT NULL REFERENCES contracts(id),
    stage_name TEXT NOT NULL,
    data TEXT
);

CREATE TABLE IF NOT EXISTS workflow_execution (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL UNIQUE,
    workflow_id TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_wf_exec_status ON workflow_execution(status);
CREATE INDEX IF NOT EXISTS idx_wf_exec_id ON workflow_execution(execution_id);

CREATE TABLE IF NOT EXISTS workflow_step_execution (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    step_type TEXT NOT NULL,
    status TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    error_message TEXT,
    UNIQUE(execution_id, step_id)
);
CREATE INDEX IF NOT EXISTS idx_wf_step_exec ON workflow_step_execution(execution_id);
CREATE INDEX IF NOT EXISTS idx_wf_step_id ON workflow_step_execution(step_id);

CREATE TABLE IF NOT EXISTS workflow_approval (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    prompt TEXT,
    allowed_actions TEXT NOT NULL,
    decision TEXT,
    actor_id TEXT,
    requested_at INTEGER NOT NULL,
    resolved_at INTEGER,
    UNIQUE(execution_id, step_id)
);
CREATE INDEX IF NOT EXISTS idx_approval_exec ON workflow_approval(execution_id);
CREATE INDEX IF NOT EXISTS idx_approval_decision ON workflow_approval(decision);

CREATE TABLE IF NOT EXISTS ai_suggestion_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    suggestion_id TEXT NOT NULL,
    suggestion_type TEXT NOT NULL,
    context TEXT NOT NULL,
    title TEXT,
    confidence REAL NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_suggestion_context ON ai_suggestion_audit(context);

CREATE TABLE IF NOT EXISTS ai_guardrail_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    suggestion_id TEXT NOT NULL,
    decision TEXT NOT NULL,
    reason TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ai_draft_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    draft_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
"#;

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
