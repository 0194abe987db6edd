//! Declarative migration plans
//!
//! A [`MigrationPlan`] describes a store's steps as data, using the
//! [`FieldOp`] vocabulary. Plans load from TOML, YAML or JSON:
//!
//! ```toml
//! store = "editor-settings"
//!
//! [[steps]]
//! version = 1
//! description = "add theme"
//! ops = [{ op = "add_field", key = "theme", value = "light" }]
//!
//! [[steps]]
//! version = 2
//! description = "rename theme"
//! critical = true
//! requires = ["theme"]
//! ops = [{ op = "rename_field", from = "theme", to = "colorMode" }]
//! ```

use crate::error::MigrationError;
use crate::manager::{ManagerConfig, MigrationManager};
use crate::ops::FieldOp;
use crate::step::MigrationStep;
use crate::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Errors loading or converting a plan
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Plan file could not be read
    #[error("failed to read plan {path}: {source}")]
    Io {
        /// Plan path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid TOML plan: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML syntax or shape error
    #[error("invalid YAML plan: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON plan: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension not recognized
    #[error("unsupported plan format: {0}")]
    UnsupportedFormat(String),

    /// Steps could not be registered
    #[error("invalid plan: {0}")]
    Registration(#[from] MigrationError),
}

/// One declarative step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step version
    pub version: Version,

    /// Step description
    #[serde(default)]
    pub description: String,

    /// Halt the run on failure
    #[serde(default)]
    pub critical: bool,

    /// Top-level keys that must exist for the step to run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    /// Field operations, applied in order
    pub ops: Vec<FieldOp>,
}

impl PlanStep {
    /// Convert into a runnable step
    #[must_use]
    pub fn to_step(&self) -> MigrationStep<Value> {
        let description = if self.description.is_empty() {
            format!("plan step {}", self.version)
        } else {
            self.description.clone()
        };

        let mut step = MigrationStep::from_ops(self.version, description, self.ops.clone());
        if !self.requires.is_empty() {
            let required = self.requires.clone();
            step = step.with_validate(move |state: &Value| {
                state
                    .as_object()
                    .is_some_and(|map| required.iter().all(|key| map.contains_key(key)))
            });
        }
        if self.critical {
            step = step.critical();
        }
        step
    }
}

/// Declarative migration set for one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Store name
    pub store: String,

    /// Version the plan migrates to; defaults to the highest step version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<Version>,

    /// Steps, in any order
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl MigrationPlan {
    /// Parse TOML
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or does not match the plan shape
    pub fn from_toml_str(input: &str) -> Result<Self, PlanError> {
        Ok(toml::from_str(input)?)
    }

    /// Parse YAML
    ///
    /// # Errors
    /// Returns error if the YAML is malformed or does not match the plan shape
    pub fn from_yaml_str(input: &str) -> Result<Self, PlanError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Parse JSON
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or does not match the plan shape
    pub fn from_json_str(input: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load from file, picking the format by extension
    ///
    /// # Errors
    /// Returns error on IO failure, unknown extension or parse failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "toml" => Self::from_toml_str(&input),
            "yaml" | "yml" => Self::from_yaml_str(&input),
            "json" => Self::from_json_str(&input),
            other => Err(PlanError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Version this plan migrates to
    #[must_use]
    pub fn target_version(&self) -> Version {
        self.target_version
            .or_else(|| self.steps.iter().map(|s| s.version).max())
            .unwrap_or(0)
    }

    /// Build a populated manager
    ///
    /// # Errors
    /// Returns error if the plan contains duplicate or zero versions
    pub fn build_manager(&self) -> Result<MigrationManager<Value>, PlanError> {
        self.build_manager_with(ManagerConfig::new(self.store.clone()))
    }

    /// Build a populated manager with explicit config
    ///
    /// # Errors
    /// Returns error if the steps cannot be registered under `config`
    pub fn build_manager_with(
        &self,
        config: ManagerConfig,
    ) -> Result<MigrationManager<Value>, PlanError> {
        let mut manager = MigrationManager::with_config(config);
        manager.add_migrations(self.steps.iter().map(PlanStep::to_step))?;
        tracing::debug!(store = %self.store, steps = manager.len(), "Loaded migration plan");
        Ok(manager)
    }
}
