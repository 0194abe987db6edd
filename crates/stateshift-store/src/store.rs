//! Versioned store: hydrate, migrate, fall back, persist
//!
//! [`VersionedStore`] is the caller side of the migration runner. It reads the
//! persisted envelope, runs the manager when the stored version is stale, and
//! decides what to adopt:
//!
//! | Stored envelope            | Adopted state                  | Persisted |
//! |----------------------------|--------------------------------|-----------|
//! | absent                     | `T::default()`                 | yes       |
//! | current version            | decoded snapshot               | no        |
//! | older, migration succeeds  | decoded migrated snapshot      | yes       |
//! | older, migration fails     | `T::default()`                 | yes       |
//! | newer than current         | decoded snapshot, unchanged    | no        |
//! | corrupt / undecodable      | `T::default()`                 | yes       |

use crate::backend::StorageBackend;
use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stateshift_migrate::{MigrationManager, MigrationResult, Version};
use std::cmp::Ordering;

/// Serialized form of a store: `{"state": ..., "version": n}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEnvelope {
    /// Snapshot
    pub state: Value,

    /// Version the snapshot was written under
    #[serde(default)]
    pub version: Version,
}

impl PersistedEnvelope {
    /// Create envelope
    #[inline]
    #[must_use]
    pub fn new(state: Value, version: Version) -> Self {
        Self { state, version }
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or has no `state`
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode as JSON
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be encoded
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage key and store name
    pub name: String,

    /// Version the running code expects
    pub version: Version,

    /// Drop rollback checkpoints once a migrated state is adopted
    #[serde(default = "default_true")]
    pub clear_rollback_on_success: bool,

    /// Write the migrated state back under the current version
    #[serde(default = "default_true")]
    pub persist_after_migration: bool,
}

fn default_true() -> bool {
    true
}

impl StoreConfig {
    /// Create config with default policies
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            clear_rollback_on_success: true,
            persist_after_migration: true,
        }
    }

    /// Keep rollback checkpoints after a successful migration
    #[inline]
    #[must_use]
    pub fn keep_checkpoints(mut self) -> Self {
        self.clear_rollback_on_success = false;
        self
    }

    /// Do not write back after migrating
    #[inline]
    #[must_use]
    pub fn without_write_back(mut self) -> Self {
        self.persist_after_migration = false;
        self
    }
}

/// Where the hydrated state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationSource {
    /// Nothing was stored
    Fresh,

    /// Stored under the current version
    Current,

    /// Migrated from an older version
    Migrated,

    /// Stored snapshot was unusable; defaults adopted
    FellBack,

    /// Stored under a newer version; kept as-is
    Newer,
}

/// Result of [`VersionedStore::hydrate`]
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationOutcome {
    /// Where the live state came from
    pub source: HydrationSource,

    /// Version found in storage, if anything was stored
    pub stored_version: Option<Version>,

    /// Migration result, when a migration ran
    pub migration: Option<MigrationResult<Value>>,

    /// Why the store fell back, when it did
    pub fallback_reason: Option<String>,
}

impl HydrationOutcome {
    fn new(source: HydrationSource, stored_version: Option<Version>) -> Self {
        Self {
            source,
            stored_version,
            migration: None,
            fallback_reason: None,
        }
    }

    /// Check if the store had to discard its snapshot
    #[inline]
    #[must_use]
    pub fn fell_back(&self) -> bool {
        self.source == HydrationSource::FellBack
    }
}

/// Persisted, versioned state container
///
/// The migration manager, storage backend and live state are all injected;
/// nothing is reached through globals.
#[derive(Debug)]
pub struct VersionedStore<T, B> {
    config: StoreConfig,
    backend: B,
    manager: MigrationManager<Value>,
    state: T,
}

impl<T, B> VersionedStore<T, B>
where
    T: Serialize + DeserializeOwned + Default + Clone,
    B: StorageBackend,
{
    /// Create store holding `T::default()`; call [`hydrate`](Self::hydrate) to load
    #[must_use]
    pub fn new(config: StoreConfig, backend: B, manager: MigrationManager<Value>) -> Self {
        Self {
            config,
            backend,
            manager,
            state: T::default(),
        }
    }

    /// Create and hydrate in one go
    ///
    /// # Errors
    /// Returns error if storage cannot be read or written
    pub fn open(
        config: StoreConfig,
        backend: B,
        manager: MigrationManager<Value>,
    ) -> Result<(Self, HydrationOutcome), StoreError> {
        let mut store = Self::new(config, backend, manager);
        let outcome = store.hydrate()?;
        Ok((store, outcome))
    }

    /// Load the persisted snapshot, migrating it if stale
    ///
    /// # Errors
    /// Returns error only for storage IO or encoding failures; unusable
    /// snapshots fall back to defaults instead
    pub fn hydrate(&mut self) -> Result<HydrationOutcome, StoreError> {
        let name = self.config.name.clone();
        let current = self.config.version;

        let Some(raw) = self.backend.load(&name)? else {
            tracing::info!(store = %name, version = current, "No persisted state, starting fresh");
            self.state = T::default();
            self.persist()?;
            return Ok(HydrationOutcome::new(HydrationSource::Fresh, None));
        };

        let envelope = match PersistedEnvelope::from_json(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                return self.fall_back(
                    HydrationOutcome::new(HydrationSource::FellBack, None),
                    format!("corrupt envelope: {err}"),
                );
            }
        };
        let stored = envelope.version;

        match stored.cmp(&current) {
            Ordering::Equal => match decode::<T>(envelope.state) {
                Ok(state) => {
                    tracing::debug!(store = %name, version = current, "Hydrated current state");
                    self.state = state;
                    Ok(HydrationOutcome::new(HydrationSource::Current, Some(stored)))
                }
                Err(reason) => self.fall_back(
                    HydrationOutcome::new(HydrationSource::FellBack, Some(stored)),
                    reason,
                ),
            },
            Ordering::Greater => match decode::<T>(envelope.state) {
                Ok(state) => {
                    tracing::warn!(
                        store = %name,
                        stored,
                        current,
                        "Persisted state is newer than this build, keeping it unmigrated"
                    );
                    self.state = state;
                    Ok(HydrationOutcome::new(HydrationSource::Newer, Some(stored)))
                }
                Err(reason) => self.fall_back(
                    HydrationOutcome::new(HydrationSource::FellBack, Some(stored)),
                    reason,
                ),
            },
            Ordering::Less => self.adopt_migration(&envelope.state, stored),
        }
    }

    fn adopt_migration(
        &mut self,
        snapshot: &Value,
        stored: Version,
    ) -> Result<HydrationOutcome, StoreError> {
        let current = self.config.version;
        let result = self.manager.migrate(snapshot, stored, current);

        let mut outcome = HydrationOutcome::new(HydrationSource::Migrated, Some(stored));
        if !result.success {
            let reason = result
                .errors
                .last()
                .cloned()
                .unwrap_or_else(|| "critical migration failed".to_string());
            outcome.source = HydrationSource::FellBack;
            outcome.migration = Some(result);
            return self.fall_back(outcome, reason);
        }

        match decode::<T>(result.migrated_state.clone()) {
            Ok(state) => {
                tracing::info!(
                    store = %self.config.name,
                    from = stored,
                    to = current,
                    applied = ?result.applied_migrations,
                    "Adopted migrated state"
                );
                self.state = state;
                outcome.migration = Some(result);
                if self.config.persist_after_migration {
                    self.persist()?;
                }
                if self.config.clear_rollback_on_success {
                    self.manager.clear_rollback_stack();
                }
                Ok(outcome)
            }
            Err(reason) => {
                outcome.source = HydrationSource::FellBack;
                outcome.migration = Some(result);
                self.fall_back(outcome, reason)
            }
        }
    }

    fn fall_back(
        &mut self,
        mut outcome: HydrationOutcome,
        reason: String,
    ) -> Result<HydrationOutcome, StoreError> {
        tracing::warn!(store = %self.config.name, %reason, "Discarding persisted state, using defaults");
        self.state = T::default();
        self.persist()?;
        outcome.source = HydrationSource::FellBack;
        outcome.fallback_reason = Some(reason);
        Ok(outcome)
    }

    /// Write the live state under the current version
    ///
    /// # Errors
    /// Returns error if the state cannot be encoded or written
    pub fn persist(&self) -> Result<(), StoreError> {
        self.persist_as(self.config.version)
    }

    fn persist_as(&self, version: Version) -> Result<(), StoreError> {
        let envelope = PersistedEnvelope::new(serde_json::to_value(&self.state)?, version);
        self.backend.save(&self.config.name, &envelope.to_json()?)
    }

    /// Live state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &T {
        &self.state
    }

    /// Replace and persist the live state
    ///
    /// # Errors
    /// Returns error if the state cannot be persisted
    pub fn set_state(&mut self, state: T) -> Result<(), StoreError> {
        self.state = state;
        self.persist()
    }

    /// Mutate and persist the live state
    ///
    /// # Errors
    /// Returns error if the state cannot be persisted
    pub fn update<F: FnOnce(&mut T)>(&mut self, f: F) -> Result<(), StoreError> {
        f(&mut self.state);
        self.persist()
    }

    /// Reset to defaults and persist
    ///
    /// # Errors
    /// Returns error if the state cannot be persisted
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.set_state(T::default())
    }

    /// Drop the persisted snapshot; the live state is kept
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    pub fn clear_persisted(&self) -> Result<(), StoreError> {
        self.backend.remove(&self.config.name)
    }

    /// Roll back through the manager's checkpoints
    ///
    /// The rolled-back state is adopted only if it decodes into `T`. It is
    /// persisted under the version preceding the restored checkpoint, so the
    /// next hydration re-applies the undone steps. Returns `None` when there
    /// is no checkpoint or the state does not decode.
    ///
    /// # Errors
    /// Returns error if the adopted state cannot be persisted
    pub fn rollback(&mut self, target: Version) -> Result<Option<T>, StoreError> {
        let Some(report) = self.manager.rollback_with_report(target) else {
            return Ok(None);
        };
        let version = report.state_version();

        match decode::<T>(report.state) {
            Ok(state) => {
                tracing::info!(store = %self.config.name, target, version, "Adopted rolled-back state");
                self.state = state.clone();
                self.persist_as(version)?;
                Ok(Some(state))
            }
            Err(reason) => {
                tracing::warn!(store = %self.config.name, target, %reason, "Rolled-back state does not decode");
                Ok(None)
            }
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Migration manager
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &MigrationManager<Value> {
        &self.manager
    }

    /// Migration manager, mutably
    #[inline]
    pub fn manager_mut(&mut self) -> &mut MigrationManager<Value> {
        &mut self.manager
    }

    /// Storage backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("snapshot does not match state shape: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stateshift_migrate::{FieldOp, MigrationStep, StepError};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Settings {
        #[serde(default)]
        color_mode: String,
    }

    fn manager() -> MigrationManager<Value> {
        let mut manager = MigrationManager::new("settings");
        manager
            .add_migrations([
                MigrationStep::from_ops(1, "add theme", vec![FieldOp::add("theme", "light")]),
                MigrationStep::from_ops(2, "rename", vec![FieldOp::rename("theme", "colorMode")]),
            ])
            .unwrap();
        manager
    }

    fn seeded(raw: &str) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.save("settings", raw).unwrap();
        storage
    }

    #[test]
    fn fresh_store_persists_defaults() {
        let storage = MemoryStorage::new();
        let (store, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage.clone(), manager())
                .unwrap();

        assert_eq!(outcome.source, HydrationSource::Fresh);
        assert_eq!(store.state(), &Settings::default());
        let envelope = PersistedEnvelope::from_json(&storage.load("settings").unwrap().unwrap()).unwrap();
        assert_eq!(envelope.version, 2);
    }

    #[test]
    fn stale_state_is_migrated_and_written_back() {
        let storage = seeded(r#"{"state": {}, "version": 0}"#);
        let (store, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage.clone(), manager())
                .unwrap();

        assert_eq!(outcome.source, HydrationSource::Migrated);
        assert_eq!(outcome.stored_version, Some(0));
        assert_eq!(store.state().color_mode, "light");
        assert!(store.manager().checkpoints().is_empty());

        let envelope = PersistedEnvelope::from_json(&storage.load("settings").unwrap().unwrap()).unwrap();
        assert_eq!(envelope, PersistedEnvelope::new(json!({"colorMode": "light"}), 2));
    }

    #[test]
    fn current_state_is_not_rewritten() {
        let raw = r#"{"state": {"colorMode": "dark"}, "version": 2}"#;
        let storage = seeded(raw);
        let (store, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage.clone(), manager())
                .unwrap();

        assert_eq!(outcome.source, HydrationSource::Current);
        assert_eq!(store.state().color_mode, "dark");
        assert_eq!(storage.load("settings").unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn critical_failure_falls_back() {
        let mut manager = MigrationManager::new("settings");
        manager
            .add_migration(
                MigrationStep::new(1, "explode", |_: Value, _| Err(StepError::failed("nope")))
                    .critical(),
            )
            .unwrap();
        let storage = seeded(r#"{"state": {"colorMode": "dark"}, "version": 0}"#);

        let (store, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 1), storage, manager)
                .unwrap();

        assert!(outcome.fell_back());
        assert!(outcome.fallback_reason.unwrap().contains("nope"));
        assert!(!outcome.migration.unwrap().success);
        assert_eq!(store.state(), &Settings::default());
    }

    #[test]
    fn corrupt_envelope_falls_back() {
        let storage = seeded("not json");
        let (_, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage, manager())
                .unwrap();
        assert!(outcome.fell_back());
        assert_eq!(outcome.stored_version, None);
    }

    #[test]
    fn newer_state_is_kept() {
        let storage = seeded(r#"{"state": {"colorMode": "dark"}, "version": 9}"#);
        let (store, outcome) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage, manager())
                .unwrap();
        assert_eq!(outcome.source, HydrationSource::Newer);
        assert_eq!(store.state().color_mode, "dark");
    }

    #[test]
    fn update_persists() {
        let storage = MemoryStorage::new();
        let (mut store, _) =
            VersionedStore::<Settings, _>::open(StoreConfig::new("settings", 2), storage.clone(), manager())
                .unwrap();

        store.update(|s| s.color_mode = "sepia".into()).unwrap();
        let envelope = PersistedEnvelope::from_json(&storage.load("settings").unwrap().unwrap()).unwrap();
        assert_eq!(envelope.state, json!({"colorMode": "sepia"}));

        store.reset().unwrap();
        assert_eq!(store.state(), &Settings::default());
    }

    #[test]
    fn rollback_adopts_decodable_state() {
        let storage = seeded(r#"{"state": {}, "version": 0}"#);
        let config = StoreConfig::new("settings", 2).keep_checkpoints();
        let (mut store, _) = VersionedStore::<Settings, _>::open(config, storage.clone(), manager()).unwrap();
        assert_eq!(store.manager().checkpoint_versions(), vec![1, 2]);

        let rolled = store.rollback(1).unwrap().unwrap();
        assert_eq!(rolled, Settings::default());
        let envelope = PersistedEnvelope::from_json(&storage.load("settings").unwrap().unwrap()).unwrap();
        assert_eq!(envelope.version, 0);
        assert_eq!(envelope.state, json!({"colorMode": ""}));
    }

    #[test]
    fn config_defaults_from_json() {
        let config: StoreConfig = serde_json::from_str(r#"{"name": "ui", "version": 3}"#).unwrap();
        assert!(config.clear_rollback_on_success);
        assert!(config.persist_after_migration);
    }
}
