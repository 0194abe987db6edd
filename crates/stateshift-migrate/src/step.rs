//! Migration steps and their invocation context
//!
//! A [`MigrationStep`] is one versioned transformation of a snapshot: an `up`
//! transform, an optional inverse `down`, an optional `validate` gate and a
//! `critical` flag deciding whether its failure halts the whole run.

use crate::error::{MigrationError, StepError};
use crate::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Forward or backward transform of a snapshot
pub type TransformFn<S> = Arc<dyn Fn(S, &MigrationContext) -> Result<S, StepError> + Send + Sync>;

/// Predicate gating whether a step may run against the current snapshot
pub type ValidateFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Ephemeral context handed to every `up`/`down` call
///
/// Rebuilt per invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationContext {
    /// Version the whole run started from
    pub from_version: Version,

    /// Version the whole run is heading to
    pub to_version: Version,

    /// Logical store being migrated
    pub store_name: String,

    /// Wall-clock time of this invocation
    pub timestamp: DateTime<Utc>,
}

impl MigrationContext {
    /// Create context stamped with the current time
    #[inline]
    #[must_use]
    pub fn new(from_version: Version, to_version: Version, store_name: impl Into<String>) -> Self {
        Self {
            from_version,
            to_version,
            store_name: store_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One versioned transformation unit
pub struct MigrationStep<S> {
    version: Version,
    description: String,
    up: TransformFn<S>,
    down: Option<TransformFn<S>>,
    validate: Option<ValidateFn<S>>,
    critical: bool,
}

impl<S> MigrationStep<S> {
    /// Create a non-critical step with only an `up` transform
    ///
    /// Version validity is checked when the step is registered.
    #[must_use]
    pub fn new<F>(version: Version, description: impl Into<String>, up: F) -> Self
    where
        F: Fn(S, &MigrationContext) -> Result<S, StepError> + Send + Sync + 'static,
    {
        Self {
            version,
            description: description.into(),
            up: Arc::new(up),
            down: None,
            validate: None,
            critical: false,
        }
    }

    /// Start building a step
    #[inline]
    #[must_use]
    pub fn builder(version: Version, description: impl Into<String>) -> StepBuilder<S> {
        StepBuilder::new(version, description)
    }

    /// Schema revision this step produces
    #[inline]
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Human-readable label
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether failure aborts the whole run
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Whether a `down` transform exists
    #[inline]
    #[must_use]
    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }

    /// Whether a `validate` gate exists
    #[inline]
    #[must_use]
    pub fn has_validate(&self) -> bool {
        self.validate.is_some()
    }

    /// Mark the step critical
    #[inline]
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Attach a `down` transform
    #[must_use]
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(S, &MigrationContext) -> Result<S, StepError> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    /// Attach a `validate` gate
    #[must_use]
    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Run the validation gate; steps without one always pass
    #[inline]
    #[must_use]
    pub fn validates(&self, state: &S) -> bool {
        self.validate.as_ref().map_or(true, |v| v(state))
    }

    /// Apply the forward transform
    ///
    /// # Errors
    /// Propagates whatever the transform returns
    #[inline]
    pub fn apply_up(&self, state: S, ctx: &MigrationContext) -> Result<S, StepError> {
        (self.up)(state, ctx)
    }

    /// Apply the inverse transform, if one exists
    #[inline]
    pub fn apply_down(&self, state: S, ctx: &MigrationContext) -> Option<Result<S, StepError>> {
        self.down.as_ref().map(|down| down(state, ctx))
    }
}

impl<S> Clone for MigrationStep<S> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            description: self.description.clone(),
            up: Arc::clone(&self.up),
            down: self.down.clone(),
            validate: self.validate.clone(),
            critical: self.critical,
        }
    }
}

impl<S> fmt::Debug for MigrationStep<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("critical", &self.critical)
            .field("has_down", &self.has_down())
            .field("has_validate", &self.has_validate())
            .finish()
    }
}

/// Builder for [`MigrationStep`]
pub struct StepBuilder<S> {
    version: Version,
    description: String,
    up: Option<TransformFn<S>>,
    down: Option<TransformFn<S>>,
    validate: Option<ValidateFn<S>>,
    critical: bool,
}

impl<S> StepBuilder<S> {
    /// Create new builder
    #[inline]
    #[must_use]
    pub fn new(version: Version, description: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            up: None,
            down: None,
            validate: None,
            critical: false,
        }
    }

    /// Set forward transform
    #[must_use]
    pub fn up<F>(mut self, up: F) -> Self
    where
        F: Fn(S, &MigrationContext) -> Result<S, StepError> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(up));
        self
    }

    /// Set inverse transform
    #[must_use]
    pub fn down<F>(mut self, down: F) -> Self
    where
        F: Fn(S, &MigrationContext) -> Result<S, StepError> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    /// Set validation gate
    #[must_use]
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Mark critical
    #[inline]
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Set critical flag explicitly
    #[inline]
    #[must_use]
    pub fn critical_if(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Build step
    ///
    /// # Errors
    /// Returns error if the version is zero or no `up` transform was set
    pub fn build(self) -> Result<MigrationStep<S>, MigrationError> {
        if self.version == 0 {
            return Err(MigrationError::InvalidVersion(self.version));
        }

        let up = self.up.ok_or_else(|| MigrationError::MissingUp {
            version: self.version,
            description: self.description.clone(),
        })?;

        Ok(MigrationStep {
            version: self.version,
            description: self.description,
            up,
            down: self.down,
            validate: self.validate,
            critical: self.critical,
        })
    }
}

impl<S> fmt::Debug for StepBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBuilder")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("has_up", &self.up.is_some())
            .field("critical", &self.critical)
            .finish_non_exhaustive()
    }
}
