//! Stateshift Store
//!
//! Versioned persisted state that hydrates through a [`MigrationManager`].
//!
//! # Core Concepts
//!
//! - [`StorageBackend`]: Where serialized envelopes live ([`MemoryStorage`], [`FileStorage`])
//! - [`PersistedEnvelope`]: `{"state": ..., "version": n}` on disk
//! - [`VersionedStore`]: Load, migrate stale snapshots, fall back to defaults, write back
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use stateshift_migrate::{FieldOp, MigrationManager, MigrationStep};
//! use stateshift_store::{HydrationSource, MemoryStorage, StoreConfig, VersionedStore};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Prefs {
//!     #[serde(default)]
//!     density: String,
//! }
//!
//! let mut manager = MigrationManager::new("prefs");
//! manager
//!     .add_migration(MigrationStep::from_ops(1, "density", vec![FieldOp::add("density", "cozy")]))
//!     .unwrap();
//!
//! let (store, outcome) =
//!     VersionedStore::<Prefs, _>::open(StoreConfig::new("prefs", 1), MemoryStorage::new(), manager)
//!         .unwrap();
//! assert_eq!(outcome.source, HydrationSource::Fresh);
//! assert_eq!(store.state().density, "");
//! ```
//!
//! [`MigrationManager`]: stateshift_migrate::MigrationManager

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod error;
mod store;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use error::StoreError;
pub use store::{
    HydrationOutcome, HydrationSource, PersistedEnvelope, StoreConfig, VersionedStore,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
