// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration state.
//!
//! Two JSON documents under the config directory: `settings.json` (user
//! settings) and `modules.json` (per-worker enablement and paths). Both
//! are materialized from defaults on first run, exposed as a dotted
//! key/value view (`general.theme`, `engine.python.enabled`), mutated in
//! memory, and re-emitted on save with a `.bak` of the previous version.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clerk_core::EventBus;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

const SETTINGS_FILE: &str = "settings.json";
const MODULES_FILE: &str = "modules.json";

/// Flat-view prefix for the modules document.
const ENGINE_PREFIX: &str = "engine";

/// One worker's configuration from the modules document.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerModule {
    pub name: String,
    pub enabled: bool,
    /// Script or executable path.
    pub path: String,
    /// Interpreter to prefix the path with (`python3`, `node`); absent for
    /// native executables.
    pub interpreter: Option<String>,
    pub max_concurrent: Option<u32>,
    pub port: Option<u16>,
}

struct Docs {
    settings: Value,
    modules: Value,
}

pub struct ConfigState {
    config_dir: PathBuf,
    bus: EventBus,
    docs: Mutex<Docs>,
}

impl ConfigState {
    /// Load both documents, creating them from defaults when missing.
    pub fn load(config_dir: &Path, bus: EventBus) -> Self {
        let settings = load_document(&config_dir.join(SETTINGS_FILE), default_settings());
        let modules = load_document(&config_dir.join(MODULES_FILE), default_modules());
        Self {
            config_dir: config_dir.to_path_buf(),
            bus,
            docs: Mutex::new(Docs { settings, modules }),
        }
    }

    /// Look up a dotted key (`general.theme`, `engine.python.enabled`).
    pub fn get(&self, key: &str) -> Option<Value> {
        let docs = self.docs.lock();
        let (doc, path) = match key.split_once('.') {
            Some((ENGINE_PREFIX, rest)) => (&docs.modules, rest),
            _ => (&docs.settings, key),
        };
        let mut current = doc;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Set a dotted key, creating intermediate objects. In-memory only
    /// until [`ConfigState::save`]. Publishes `state.config.changed`.
    pub fn set(&self, key: &str, value: Value) {
        {
            let mut docs = self.docs.lock();
            let (doc, path) = match key.split_once('.') {
                Some((ENGINE_PREFIX, rest)) => (&mut docs.modules, rest),
                _ => (&mut docs.settings, key),
            };
            let mut current = doc;
            let parts: Vec<&str> = path.split('.').collect();
            for part in &parts[..parts.len() - 1] {
                if !current.get(*part).map(Value::is_object).unwrap_or(false) {
                    if let Value::Object(map) = current {
                        map.insert((*part).to_string(), Value::Object(Map::new()));
                    } else {
                        warn!(key, "config path walks through a non-object, ignoring set");
                        return;
                    }
                }
                // Present by construction above.
                let Some(next) = current.get_mut(*part) else { return };
                current = next;
            }
            if let (Value::Object(map), Some(last)) = (current, parts.last()) {
                map.insert((*last).to_string(), value.clone());
            } else {
                warn!(key, "config leaf is not assignable, ignoring set");
                return;
            }
        }
        self.bus.publish("state.config.changed", json!({"key": key, "value": value}));
    }

    /// The whole configuration as a flat dotted map.
    pub fn flattened(&self) -> BTreeMap<String, Value> {
        let docs = self.docs.lock();
        let mut flat = BTreeMap::new();
        flatten_into(&docs.settings, String::new(), &mut flat);
        flatten_into(&docs.modules, ENGINE_PREFIX.to_string(), &mut flat);
        flat
    }

    /// Worker entries from the modules document, in name order.
    pub fn worker_modules(&self) -> Vec<WorkerModule> {
        let docs = self.docs.lock();
        let Value::Object(sections) = &docs.modules else {
            return Vec::new();
        };
        let mut modules: Vec<WorkerModule> = sections
            .iter()
            .filter_map(|(name, section)| {
                Some(WorkerModule {
                    name: name.clone(),
                    enabled: section.get("enabled")?.as_bool().unwrap_or(false),
                    path: section.get("path")?.as_str().unwrap_or_default().to_string(),
                    interpreter: section
                        .get("interpreter")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    max_concurrent: section
                        .get("maxConcurrent")
                        .and_then(Value::as_u64)
                        .map(|v| v as u32),
                    port: section.get("port").and_then(Value::as_u64).map(|v| v as u16),
                })
            })
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    /// Re-emit both documents, writing `.bak` copies of the previous
    /// versions first.
    pub fn save(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let docs = self.docs.lock();
        write_with_backup(&self.config_dir.join(SETTINGS_FILE), &docs.settings)?;
        write_with_backup(&self.config_dir.join(MODULES_FILE), &docs.modules)?;
        info!(dir = %self.config_dir.display(), "configuration saved");
        Ok(())
    }
}

fn load_document(path: &Path, defaults: Value) -> Value {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config document, using defaults");
                defaults
            }
        },
        Err(_) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(text) = serde_json::to_string_pretty(&defaults) {
                if let Err(e) = std::fs::write(path, text) {
                    warn!(path = %path.display(), error = %e, "could not materialize defaults");
                }
            }
            info!(path = %path.display(), "config document created from defaults");
            defaults
        }
    }
}

fn write_with_backup(path: &Path, value: &Value) -> std::io::Result<()> {
    if path.exists() {
        let backup = path.with_extension("json.bak");
        std::fs::copy(path, backup)?;
    }
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, text)
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_key =
                    if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_into(child, child_key, out);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}

fn default_settings() -> Value {
    json!({
        "general": {
            "theme": "light",
            "language": "de",
            "autosave": true
        },
        "export": {
            "default_dir": "exports",
            "pdf_author": "Clerk"
        },
        "vat": {
            "rate": 0.19,
            "rounding": "half_up"
        }
    })
}

fn default_modules() -> Value {
    json!({
        "python": {
            "enabled": true,
            "interpreter": "python3",
            "path": "workers/python_worker.py",
            "maxConcurrent": 4
        },
        "network": {
            "enabled": true,
            "interpreter": "node",
            "path": "workers/network_worker.js",
            "port": 0
        },
        "native": {
            "enabled": true,
            "path": "workers/native_worker"
        }
    })
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
