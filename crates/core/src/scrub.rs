// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential scrubbing.
//!
//! Anything that might carry a secret is scrubbed before it reaches a log
//! line or a persisted summary. Matching is by key name: a JSON object
//! field whose key contains one of the sensitive markers has its value
//! replaced wholesale.

use serde_json::Value;

const SENSITIVE_MARKERS: &[&str] =
    &["password", "passwd", "secret", "token", "credential", "api_key", "apikey", "authorization"];

const REDACTED: &str = "[redacted]";

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Return a copy of `value` with all sensitive fields redacted, recursively.
pub fn scrub_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), scrub_value(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(scrub_value).collect()),
        other => other.clone(),
    }
}

/// Scrub free text that may embed `key=value` or `key: value` credentials.
pub fn scrub_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&scrub_line(line));
    }
    out
}

fn scrub_line(line: &str) -> String {
    for sep in ['=', ':'] {
        if let Some(pos) = line.find(sep) {
            let (key, rest) = line.split_at(pos);
            if is_sensitive_key(key.trim()) && rest.len() > 1 {
                return format!("{key}{sep} {REDACTED}");
            }
        }
    }
    line.to_string()
}

#[cfg(test)]
#[path = "scrub_tests.rs"]
mod tests;
