// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clerk_core::EventBus;
use serde_json::json;

fn load_in(dir: &Path) -> (ConfigState, EventBus) {
    let (bus, _pump) = EventBus::new();
    (ConfigState::load(dir, bus.clone()), bus)
}

#[test]
fn missing_documents_are_materialized_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _bus) = load_in(dir.path());

    assert!(dir.path().join("settings.json").exists());
    assert!(dir.path().join("modules.json").exists());
    assert_eq!(state.get("general.theme"), Some(json!("light")));
    assert_eq!(state.get("engine.python.enabled"), Some(json!(true)));
}

#[test]
fn existing_documents_win_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        json!({"general": {"theme": "dark"}}).to_string(),
    )
    .unwrap();
    let (state, _bus) = load_in(dir.path());
    assert_eq!(state.get("general.theme"), Some(json!("dark")));
    // Keys absent from the document are absent, not defaulted.
    assert_eq!(state.get("general.autosave"), None);
    assert_eq!(state.get_or("general.autosave", json!(false)), json!(false));
}

#[tokio::test]
async fn set_creates_intermediate_objects_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, pump) = EventBus::new();
    let state = ConfigState::load(dir.path(), bus.clone());
    tokio::spawn(pump.run());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    bus.subscribe("state.config.changed", move |_, payload| {
        let _ = tx.send(payload.clone());
    });

    state.set("export.watermark.text", json!("DRAFT"));
    assert_eq!(state.get("export.watermark.text"), Some(json!("DRAFT")));

    state.set("engine.python.enabled", json!(false));
    assert_eq!(state.get("engine.python.enabled"), Some(json!(false)));

    let first = rx.recv().await.unwrap();
    assert_eq!(first["key"], json!("export.watermark.text"));
    let second = rx.recv().await.unwrap();
    assert_eq!(second["key"], json!("engine.python.enabled"));
}

#[test]
fn flattened_view_uses_dotted_keys() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _bus) = load_in(dir.path());
    let flat = state.flattened();
    assert_eq!(flat.get("general.theme"), Some(&json!("light")));
    assert_eq!(flat.get("vat.rate"), Some(&json!(0.19)));
    assert_eq!(flat.get("engine.native.enabled"), Some(&json!(true)));
    assert_eq!(flat.get("engine.python.interpreter"), Some(&json!("python3")));
}

#[test]
fn worker_modules_reflect_the_modules_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("modules.json"),
        json!({
            "python": {"enabled": true, "interpreter": "python3", "path": "w.py", "maxConcurrent": 2},
            "native": {"enabled": false, "path": "native_worker"}
        })
        .to_string(),
    )
    .unwrap();
    let (state, _bus) = load_in(dir.path());

    let modules = state.worker_modules();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].name, "native");
    assert!(!modules[0].enabled);
    assert!(modules[0].interpreter.is_none());
    assert_eq!(modules[1].name, "python");
    assert_eq!(modules[1].max_concurrent, Some(2));
}

#[test]
fn save_writes_backups_of_previous_versions() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _bus) = load_in(dir.path());

    state.set("general.theme", json!("dark"));
    state.save().unwrap();

    // The backup holds the pre-save content (defaults), the live file the
    // mutated one.
    let backup: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("settings.json.bak")).unwrap(),
    )
    .unwrap();
    assert_eq!(backup["general"]["theme"], json!("light"));
    let live: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
            .unwrap();
    assert_eq!(live["general"]["theme"], json!("dark"));
}

#[test]
fn malformed_document_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{broken").unwrap();
    let (state, _bus) = load_in(dir.path());
    assert_eq!(state.get("general.theme"), Some(json!("light")));
}
