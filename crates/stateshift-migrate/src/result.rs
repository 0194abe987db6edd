//! Migration outcomes and registry diagnostics

use crate::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single `migrate()` call
///
/// A fresh value is produced per call; the runner never hands out a result it
/// later mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult<S> {
    /// `false` only when a critical step failed
    pub success: bool,

    /// State after every applied step
    pub migrated_state: S,

    /// Versions applied, in application order
    pub applied_migrations: Vec<Version>,

    /// One message per failed step
    pub errors: Vec<String>,

    /// One message per non-critical step that was skipped
    pub warnings: Vec<String>,

    /// Structured view of the same failures
    pub failures: Vec<StepFailure>,
}

impl<S> MigrationResult<S> {
    /// Successful result that applied nothing
    #[inline]
    #[must_use]
    pub fn unchanged(state: S) -> Self {
        Self {
            success: true,
            migrated_state: state,
            applied_migrations: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Whether any step was skipped or failed
    #[inline]
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Version of the critical step that halted the run
    #[must_use]
    pub fn halted_at(&self) -> Option<Version> {
        if self.success {
            return None;
        }
        self.failures.iter().find(|f| f.critical).map(|f| f.version)
    }

    /// Map the state, keeping the diagnostics
    #[must_use]
    pub fn map_state<U, F: FnOnce(S) -> U>(self, f: F) -> MigrationResult<U> {
        MigrationResult {
            success: self.success,
            migrated_state: f(self.migrated_state),
            applied_migrations: self.applied_migrations,
            errors: self.errors,
            warnings: self.warnings,
            failures: self.failures,
        }
    }
}

/// Why a step did not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// `validate` returned false
    Validation,

    /// `up` returned an error or panicked
    Transformation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Transformation => write!(f, "transformation"),
        }
    }
}

/// A step that was skipped or halted the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Step version
    pub version: Version,

    /// Failure category
    pub kind: FailureKind,

    /// Whether the step was critical
    pub critical: bool,

    /// Human-readable message
    pub message: String,
}

/// Per-step metadata exposed by [`MigrationInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step version
    pub version: Version,

    /// Step description
    pub description: String,

    /// Critical flag
    pub critical: bool,

    /// Whether a `down` is registered
    pub has_down: bool,

    /// Whether a `validate` is registered
    pub has_validate: bool,
}

/// Registry snapshot for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MigrationInfo {
    /// Number of registered steps
    pub total: usize,

    /// Registered versions, ascending
    pub versions: Vec<Version>,

    /// Highest registered version
    pub latest: Option<Version>,

    /// Metadata per step, ascending by version
    pub steps: Vec<StepInfo>,
}

/// Outcome of a rollback, with the details `rollback()` keeps silent about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport<S> {
    /// Resulting state
    pub state: S,

    /// Version of the checkpoint the state was restored from
    ///
    /// The checkpoint predates that step, so the step has not been applied.
    pub restored_from: Version,

    /// Checkpoint versions whose `down` was applied, in application order
    pub undone: Vec<Version>,

    /// Checkpoint versions that had no `down` registered
    pub skipped: Vec<Version>,

    /// Messages for missing or failed `down` transforms
    pub warnings: Vec<String>,
}

impl<S> RollbackReport<S> {
    /// Version the restored state is valid for
    ///
    /// Persisting under this version makes the next migration re-run the
    /// checkpointed step.
    #[inline]
    #[must_use]
    pub fn state_version(&self) -> Version {
        self.restored_from.saturating_sub(1)
    }
}
