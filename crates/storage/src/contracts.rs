// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque domain storage: contracts and their payment stages.
//!
//! The kernel fixes the schema but imposes nothing on the `data` payload;
//! the front-end and workers own its meaning.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: i64,
    pub contract_number: String,
    pub client_name: Option<String>,
    pub data: Value,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStageRecord {
    pub id: i64,
    pub contract_id: i64,
    pub stage_name: String,
    pub data: Value,
}

fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<ContractRecord> {
    let data: Option<String> = row.get(3)?;
    Ok(ContractRecord {
        id: row.get(0)?,
        contract_number: row.get(1)?,
        client_name: row.get(2)?,
        data: data.and_then(|d| serde_json::from_str(&d).ok()).unwrap_or(Value::Null),
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

const CONTRACT_COLUMNS: &str = "id, contract_number, client_name, data, created_at, updated_at";

impl Store {
    /// Insert a contract row. Returns the new id, or −1 on failure.
    pub fn contract_insert(
        &self,
        contract_number: &str,
        client_name: Option<&str>,
        data: &Value,
        now: u64,
    ) -> i64 {
        self.soft("contract_insert", -1, |conn| {
            conn.execute(
                "INSERT INTO contracts (contract_number, client_name, data, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![contract_number, client_name, data.to_string(), now as i64],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn contract_by_id(&self, id: i64) -> Option<ContractRecord> {
        self.soft("contract_by_id", None, |conn| {
            conn.query_row(
                &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?1"),
                [id],
                contract_from_row,
            )
            .optional()
        })
    }

    /// Contracts matching `filter` against number or client name
    /// (substring, case-insensitive); all contracts when `filter` is None.
    pub fn query_contracts(&self, filter: Option<&str>, limit: usize) -> Vec<ContractRecord> {
        self.soft("query_contracts", Vec::new(), |conn| {
            match filter {
                Some(f) => {
                    let pattern = format!("%{f}%");
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONTRACT_COLUMNS} FROM contracts \
                         WHERE contract_number LIKE ?1 OR client_name LIKE ?1 \
                         ORDER BY id DESC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![pattern, limit as i64], contract_from_row)?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONTRACT_COLUMNS} FROM contracts ORDER BY id DESC LIMIT ?1"
                    ))?;
                    let rows = stmt.query_map([limit as i64], contract_from_row)?;
                    rows.collect()
                }
            }
        })
    }

    pub fn payment_stage_insert(&self, contract_id: i64, stage_name: &str, data: &Value) -> i64 {
        self.soft("payment_stage_insert", -1, |conn| {
            conn.execute(
                "INSERT INTO payment_stages (contract_id, stage_name, data) VALUES (?1, ?2, ?3)",
                params![contract_id, stage_name, data.to_string()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn payment_stages_for(&self, contract_id: i64) -> Vec<PaymentStageRecord> {
        self.soft("payment_stages_for", Vec::new(), |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, stage_name, data FROM payment_stages \
                 WHERE contract_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([contract_id], |row| {
                let data: Option<String> = row.get(3)?;
                Ok(PaymentStageRecord {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    stage_name: row.get(2)?,
                    data: data.and_then(|d| serde_json::from_str(&d).ok()).unwrap_or(Value::Null),
                })
            })?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contract_data_is_opaque() {
        let store = Store::open_in_memory().unwrap();
        let data = json!({"vat_rate": 0.19, "anything": [1, 2, 3]});
        let id = store.contract_insert("C-2026-001", Some("Acme GmbH"), &data, 10);
        assert!(id > 0);

        let contract = store.contract_by_id(id).unwrap();
        assert_eq!(contract.contract_number, "C-2026-001");
        assert_eq!(contract.data, data);
    }

    #[test]
    fn query_filters_on_number_and_client() {
        let store = Store::open_in_memory().unwrap();
        store.contract_insert("C-1", Some("Acme"), &Value::Null, 1);
        store.contract_insert("C-2", Some("Globex"), &Value::Null, 2);

        assert_eq!(store.query_contracts(Some("glob"), 10).len(), 1);
        assert_eq!(store.query_contracts(Some("C-"), 10).len(), 2);
        assert_eq!(store.query_contracts(None, 10).len(), 2);
        assert!(store.query_contracts(Some("zzz"), 10).is_empty());
    }

    #[test]
    fn payment_stages_attach_to_contract() {
        let store = Store::open_in_memory().unwrap();
        let id = store.contract_insert("C-1", None, &Value::Null, 1);
        store.payment_stage_insert(id, "deposit", &json!({"pct": 30}));
        store.payment_stage_insert(id, "final", &json!({"pct": 70}));

        let stages = store.payment_stages_for(id);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage_name, "deposit");
    }

    #[test]
    fn missing_contract_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.contract_by_id(999).is_none());
    }
}
