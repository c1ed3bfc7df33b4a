// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload digests for execution-history summaries.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::scrub::scrub_value;

/// Digest a JSON value into a short, log-safe summary string.
///
/// Format: `sha256:<16 hex chars> <scrubbed preview>`. The preview is
/// truncated so a digest never bloats a history row.
pub fn digest_value(value: &Value) -> String {
    let scrubbed = scrub_value(value);
    let canonical = scrubbed.to_string();
    let hash = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in hash.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    let preview: String = canonical.chars().take(120).collect();
    format!("sha256:{hex} {preview}")
}
