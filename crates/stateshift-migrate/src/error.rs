//! Error types for the migration runner
//!
//! Two layers of failure exist:
//! - [`StepError`]: raised by an individual step's `up`/`down`. The runner
//!   catches these and folds them into a [`MigrationResult`](crate::MigrationResult).
//! - [`MigrationError`]: registration and construction problems, returned to
//!   the caller directly.

use crate::Version;

/// Failure raised by a step transformation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// Generic failure
    #[error("{0}")]
    Failed(String),

    /// The snapshot is not a JSON object, so field operations cannot apply
    #[error("expected an object snapshot, found {found}")]
    NotAnObject {
        /// JSON kind that was found instead
        found: &'static str,
    },

    /// A field has an unexpected shape
    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// The step panicked; the payload message is preserved
    #[error("step panicked: {0}")]
    Panicked(String),
}

impl StepError {
    /// Create a generic failure
    #[inline]
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create an invalid-value failure
    #[inline]
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Registration and construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// A step with this version is already registered
    #[error("migration version {0} is already registered")]
    DuplicateVersion(Version),

    /// Version zero is reserved for "never migrated" snapshots
    #[error("invalid migration version {0}: versions start at 1")]
    InvalidVersion(Version),

    /// A step was built without an `up` transform
    #[error("migration {version} ('{description}') has no up transform")]
    MissingUp {
        /// Step version
        version: Version,
        /// Step description
        description: String,
    },
}
