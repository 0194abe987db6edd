//! Stateshift Migration Runner
//!
//! Evolves a versioned, persisted state snapshot across releases without
//! breaking previously saved state.
//!
//! # Core Concepts
//!
//! - [`MigrationStep`]: One versioned transform (`up`, optional `down`/`validate`, `critical`)
//! - [`MigrationManager`]: Ordered registry plus runner and rollback checkpoints
//! - [`MigrationResult`]: Structured outcome; step failures never escape as errors
//! - [`FieldOp`]: Declarative whole-object transforms with derivable inverses
//! - [`MigrationPlan`]: Steps described as TOML/YAML/JSON data
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use stateshift_migrate::{FieldOp, MigrationManager, MigrationStep};
//!
//! let mut manager = MigrationManager::new("editor-settings");
//! manager
//!     .add_migrations([
//!         MigrationStep::from_ops(1, "add theme", vec![FieldOp::add("theme", "light")]),
//!         MigrationStep::from_ops(2, "rename theme", vec![FieldOp::rename("theme", "colorMode")]),
//!     ])
//!     .unwrap();
//!
//! let result = manager.migrate(&json!({}), 0, 2);
//! assert!(result.success);
//! assert_eq!(result.migrated_state, json!({"colorMode": "light"}));
//! assert_eq!(result.applied_migrations, vec![1, 2]);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod manager;
mod ops;
mod plan;
mod result;
mod step;

pub use error::{MigrationError, StepError};
pub use manager::{Checkpoint, DuplicatePolicy, ManagerConfig, MigrationManager};
pub use ops::{apply_all, invert_all, kind_of, transform_field, FieldOp};
pub use plan::{MigrationPlan, PlanError, PlanStep};
pub use result::{
    FailureKind, MigrationInfo, MigrationResult, RollbackReport, StepFailure, StepInfo,
};
pub use step::{MigrationContext, MigrationStep, StepBuilder, TransformFn, ValidateFn};

/// Schema revision number; `0` means "never migrated"
pub type Version = u32;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
