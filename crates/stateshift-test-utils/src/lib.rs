//! Testing utilities for the stateshift workspace
//!
//! Shared fixtures: a typed settings shape, its migration chain, and steps
//! that record when they run.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stateshift_migrate::{FieldOp, MigrationManager, MigrationStep, StepError, Version};
use std::sync::{Arc, Mutex};

pub const SETTINGS_STORE: &str = "editor-settings";
pub const SETTINGS_VERSION: Version = 3;

/// Editor settings as of version 3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSettings {
    pub color_mode: String,
    pub font_size: u32,
    #[serde(default)]
    pub layout: Layout,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            color_mode: "system".to_string(),
            font_size: 14,
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub panels: Vec<String>,
}

/// v1 adds `theme`, v2 renames it to `colorMode`, v3 adds `fontSize` and `layout`
pub fn settings_steps() -> Vec<MigrationStep<Value>> {
    vec![
        MigrationStep::from_ops(1, "add theme", vec![FieldOp::add("theme", "light")]),
        MigrationStep::from_ops(
            2,
            "rename theme to colorMode",
            vec![FieldOp::rename("theme", "colorMode")],
        )
        .critical(),
        MigrationStep::from_ops(
            3,
            "add font size and layout",
            vec![
                FieldOp::add("fontSize", 14),
                FieldOp::nested("layout", vec![FieldOp::add("panels", json!([]))]),
            ],
        ),
    ]
}

pub fn settings_manager() -> MigrationManager<Value> {
    let mut manager = MigrationManager::new(SETTINGS_STORE);
    manager
        .add_migrations(settings_steps())
        .expect("fixture versions are unique");
    manager
}

/// Shared log of step versions in execution order
pub type CallLog = Arc<Mutex<Vec<Version>>>;

pub fn call_log() -> CallLog {
    Arc::default()
}

/// Step that records its version and sets `"v<version>": true`
pub fn recording_step(version: Version, log: &CallLog) -> MigrationStep<Value> {
    let log = Arc::clone(log);
    MigrationStep::new(version, format!("record {version}"), move |mut state: Value, _| {
        log.lock().expect("log poisoned").push(version);
        if let Some(map) = state.as_object_mut() {
            map.insert(format!("v{version}"), Value::Bool(true));
        }
        Ok(state)
    })
}

/// Step whose `up` always fails
pub fn failing_step(version: Version, message: &str) -> MigrationStep<Value> {
    let message = message.to_string();
    MigrationStep::new(version, format!("fail {version}"), move |_: Value, _| {
        Err(StepError::failed(message.clone()))
    })
}

/// Serialized envelope as the store writes it
pub fn envelope_json(state: Value, version: Version) -> String {
    json!({"state": state, "version": version}).to_string()
}
