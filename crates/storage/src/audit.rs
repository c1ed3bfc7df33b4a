// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisor audit trail: suggestions, guardrail decisions, drafts.
//!
//! Audit writes are fail-soft by contract: a failed audit write never
//! blocks the advisor response, it only logs.

use rusqlite::{params, Row};
use serde::Serialize;

use crate::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionAuditRecord {
    pub id: i64,
    pub suggestion_id: String,
    pub suggestion_type: String,
    pub context: String,
    pub title: Option<String>,
    pub confidence: f64,
    pub level: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailAuditRecord {
    pub id: i64,
    pub suggestion_id: String,
    pub decision: String,
    pub reason: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftAuditRecord {
    pub id: i64,
    pub draft_id: String,
    pub kind: String,
    pub status: String,
    pub content_hash: String,
    pub created_at: u64,
}

fn suggestion_from_row(row: &Row<'_>) -> rusqlite::Result<SuggestionAuditRecord> {
    Ok(SuggestionAuditRecord {
        id: row.get(0)?,
        suggestion_id: row.get(1)?,
        suggestion_type: row.get(2)?,
        context: row.get(3)?,
        title: row.get(4)?,
        confidence: row.get(5)?,
        level: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

impl Store {
    pub fn audit_suggestion(
        &self,
        suggestion_id: &str,
        suggestion_type: &str,
        context: &str,
        title: &str,
        confidence: f64,
        level: &str,
        created_at: u64,
    ) {
        self.soft("audit_suggestion", 0, |conn| {
            conn.execute(
                "INSERT INTO ai_suggestion_audit \
                 (suggestion_id, suggestion_type, context, title, confidence, level, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![suggestion_id, suggestion_type, context, title, confidence, level, created_at as i64],
            )
        });
    }

    pub fn audit_guardrail(&self, suggestion_id: &str, decision: &str, reason: &str, created_at: u64) {
        self.soft("audit_guardrail", 0, |conn| {
            conn.execute(
                "INSERT INTO ai_guardrail_audit (suggestion_id, decision, reason, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![suggestion_id, decision, reason, created_at as i64],
            )
        });
    }

    pub fn audit_draft(&self, draft_id: &str, kind: &str, content_hash: &str, created_at: u64) {
        self.soft("audit_draft", 0, |conn| {
            conn.execute(
                "INSERT INTO ai_draft_audit (draft_id, kind, status, content_hash, created_at) \
                 VALUES (?1, ?2, 'draft-only', ?3, ?4)",
                params![draft_id, kind, content_hash, created_at as i64],
            )
        });
    }

    pub fn suggestion_audits(&self, context: Option<&str>, limit: usize) -> Vec<SuggestionAuditRecord> {
        self.soft("suggestion_audits", Vec::new(), |conn| {
            const COLUMNS: &str =
                "id, suggestion_id, suggestion_type, context, title, confidence, level, created_at";
            match context {
                Some(ctx) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM ai_suggestion_audit \
                         WHERE context = ?1 ORDER BY id DESC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![ctx, limit as i64], suggestion_from_row)?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM ai_suggestion_audit ORDER BY id DESC LIMIT ?1"
                    ))?;
                    let rows = stmt.query_map([limit as i64], suggestion_from_row)?;
                    rows.collect()
                }
            }
        })
    }

    pub fn guardrail_audits_for(&self, suggestion_id: &str) -> Vec<GuardrailAuditRecord> {
        self.soft("guardrail_audits_for", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, suggestion_id, decision, reason, created_at \
                 FROM ai_guardrail_audit WHERE suggestion_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([suggestion_id], |row| {
                Ok(GuardrailAuditRecord {
                    id: row.get(0)?,
                    suggestion_id: row.get(1)?,
                    decision: row.get(2)?,
                    reason: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            })?;
            rows.collect()
        })
    }

    pub fn draft_audits(&self, limit: usize) -> Vec<DraftAuditRecord> {
        self.soft("draft_audits", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, draft_id, kind, status, content_hash, created_at \
                 FROM ai_draft_audit ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], |row| {
                Ok(DraftAuditRecord {
                    id: row.get(0)?,
                    draft_id: row.get(1)?,
                    kind: row.get(2)?,
                    status: row.get(3)?,
                    content_hash: row.get(4)?,
                    created_at: row.get::<_, i64>(5)? as u64,
                })
            })?;
            rows.collect()
        })
    }
}
