// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_carry_prefix() {
    let id = ExecutionId::generate();
    assert!(id.as_str().starts_with("wfx-"));
    assert_eq!(id.suffix().len(), ID_SUFFIX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = ExecutionId::generate();
    let b = ExecutionId::generate();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = ExecutionId::from_string("wfx-abc123");
    assert_eq!(id.as_str(), "wfx-abc123");
    assert_eq!(id.suffix(), "abc123");
    assert_eq!(id, "wfx-abc123");
}

#[test]
fn suffix_of_unprefixed_id_is_whole_string() {
    let id = CommandId::from_string("raw");
    assert_eq!(id.suffix(), "raw");
}

#[test]
fn serde_is_transparent() {
    let id = SuggestionId::from_string("sug-x1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"sug-x1\"");
    let back: SuggestionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
