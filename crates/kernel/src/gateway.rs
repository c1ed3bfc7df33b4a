// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input validation in front of the router.
//!
//! Structural checks (id, operation, size), path sanitization for
//! operations that touch the filesystem, and the document extension
//! allow-list. Every rejection lands a security row in the activity log
//! and surfaces as `VALIDATION_FAILED`.

use std::path::Path;
use std::sync::Arc;

use clerk_core::{Clock, Fault, SystemClock};
use clerk_storage::{Activity, Severity, Store};
use clerk_wire::Request;
use serde_json::Value;
use tracing::warn;

use crate::router;

/// One mebibyte: the serialized-request ceiling.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[cfg(windows)]
const MAX_PATH_LEN: usize = 260;
#[cfg(not(windows))]
const MAX_PATH_LEN: usize = 4096;

/// Directories no document operation may touch.
const DENIED_DIRS: &[&str] = &[
    "/etc", "/sys", "/proc", "/boot", "/dev", "/root/.ssh",
    "C:\\Windows", "C:\\Program Files",
];

/// Extensions document operations may read or write.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "xlsx", "xls", "csv", "docx", "png", "jpg", "jpeg", "webp", "tiff", "txt", "json",
    "html",
];

/// Payload keys treated as filesystem paths.
const PATH_KEYS: &[&str] =
    &["path", "file", "input", "output", "source", "target", "dir", "template_path"];

pub struct Gateway<C: Clock = SystemClock> {
    store: Arc<Store>,
    clock: C,
}

impl<C: Clock> Gateway<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Validate one inbound request. `raw_len` is the serialized line
    /// length as received.
    pub fn validate(&self, request: &Request, raw_len: usize) -> Result<(), Fault> {
        if let Err(fault) = self.check(request, raw_len) {
            self.log_rejection(request, &fault);
            return Err(fault);
        }
        Ok(())
    }

    fn check(&self, request: &Request, raw_len: usize) -> Result<(), Fault> {
        if raw_len > MAX_REQUEST_BYTES {
            return Err(Fault::validation(format!(
                "request of {raw_len} bytes exceeds the {MAX_REQUEST_BYTES}-byte limit"
            )));
        }
        if request.id.trim().is_empty() {
            return Err(Fault::validation("correlation id must not be empty"));
        }
        if request.op.trim().is_empty() {
            return Err(Fault::validation("operation type must not be empty"));
        }

        // The basic-auth credential branch is deliberately unimplemented.
        if request.op == "SAVE_CREDENTIAL" {
            let auth_type = request
                .payload
                .as_ref()
                .and_then(|p| p.get("auth_type"))
                .and_then(Value::as_str);
            if auth_type == Some("basic") {
                return Err(Fault::not_implemented("basic auth credentials are not supported"));
            }
        }

        if router::is_document_operation(&request.op) {
            if let Some(payload) = &request.payload {
                for (key, path) in collect_paths(payload) {
                    check_path(&key, &path)?;
                }
            }
        }
        Ok(())
    }

    fn log_rejection(&self, request: &Request, fault: &Fault) {
        warn!(id = %request.id, op = %request.op, error = %fault, "request rejected");
        self.store.log_activity(
            &Activity::new("gateway.rejected", fault.message.clone())
                .severity(Severity::Security)
                .entity("request", request.id.clone())
                .module("gateway"),
            self.clock.epoch_ms(),
        );
    }
}

/// Walk the payload collecting `(key, value)` pairs whose key names a
/// filesystem path, recursing through objects and arrays of strings.
fn collect_paths(payload: &Value) -> Vec<(String, String)> {
    let mut found = Vec::new();
    collect_into(payload, &mut found);
    found
}

fn collect_into(value: &Value, out: &mut Vec<(String, String)>) {
    let Value::Object(map) = value else { return };
    for (key, child) in map {
        let lower = key.to_ascii_lowercase();
        let is_path_key = PATH_KEYS.iter().any(|p| lower == *p || lower.ends_with(&format!("_{p}")));
        match child {
            Value::String(s) if is_path_key => out.push((key.clone(), s.clone())),
            Value::Array(items) if is_path_key || lower == "inputs" || lower == "paths" => {
                for item in items {
                    if let Value::String(s) = item {
                        out.push((key.clone(), s.clone()));
                    }
                }
            }
            Value::Object(_) => collect_into(child, out),
            _ => {}
        }
    }
}

fn check_path(key: &str, path: &str) -> Result<(), Fault> {
    if path.len() > MAX_PATH_LEN {
        return Err(Fault::validation(format!(
            "path in '{key}' exceeds {MAX_PATH_LEN} characters"
        )));
    }
    if has_traversal(path) {
        return Err(Fault::validation(format!("path in '{key}' contains a traversal sequence")));
    }
    for denied in DENIED_DIRS {
        let normalized = path.replace('\\', "/");
        let denied_normalized = denied.replace('\\', "/");
        if normalized == denied_normalized
            || normalized.starts_with(&format!("{denied_normalized}/"))
        {
            return Err(Fault::validation(format!(
                "path in '{key}' is under the protected directory {denied}"
            )));
        }
    }
    if let Some(extension) = Path::new(path).extension().and_then(|e| e.to_str()) {
        let lower = extension.to_ascii_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&lower.as_str()) {
            return Err(Fault::validation(format!(
                "extension '.{lower}' in '{key}' is not permitted for document operations"
            )));
        }
    }
    Ok(())
}

/// `..` adjacent to a separator, in either direction.
fn has_traversal(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    normalized == ".."
        || normalized.starts_with("../")
        || normalized.ends_with("/..")
        || normalized.contains("/../")
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
