//! Migration registry and runner
//!
//! [`MigrationManager`] owns the ordered step registry for one logical store
//! and the rollback checkpoints taken while migrating it.
//!
//! # Run semantics
//! - Steps with `from < version <= to` run in ascending version order.
//! - The caller's snapshot is cloned once; steps only ever see the copy.
//! - A failing non-critical step is skipped and the run continues.
//! - A failing critical step halts the run with `success = false`.
//! - Step failures never escape as `Err` or as a panic.

use crate::error::{MigrationError, StepError};
use crate::result::{FailureKind, MigrationInfo, MigrationResult, RollbackReport, StepFailure, StepInfo};
use crate::step::{MigrationContext, MigrationStep};
use crate::Version;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::panic::{self, AssertUnwindSafe};

/// What to do when a version is registered twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail registration and leave the registry untouched
    #[default]
    Reject,

    /// Last registration wins
    Replace,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Logical store name, passed to every step through its context
    pub store_name: String,

    /// Duplicate-version handling
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Convert panics inside steps into step failures
    #[serde(default = "default_catch_panics")]
    pub catch_panics: bool,
}

fn default_catch_panics() -> bool {
    true
}

impl ManagerConfig {
    /// Create config for a store with default policies
    #[inline]
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            duplicate_policy: DuplicatePolicy::default(),
            catch_panics: default_catch_panics(),
        }
    }

    /// Set duplicate policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Enable or disable panic capture
    #[inline]
    #[must_use]
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

/// State saved immediately before a step's `up` ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    /// Version of the step about to run
    pub version: Version,

    /// Pre-step state
    pub state: S,
}

/// Registry and runner for one persisted store
#[derive(Debug)]
pub struct MigrationManager<S = serde_json::Value> {
    config: ManagerConfig,
    migrations: BTreeMap<Version, MigrationStep<S>>,
    rollback_stack: Vec<Checkpoint<S>>,
}

impl<S: Clone> MigrationManager<S> {
    /// Create empty manager for a store
    #[inline]
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self::with_config(ManagerConfig::new(store_name))
    }

    /// Create empty manager from config
    #[inline]
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            config,
            migrations: BTreeMap::new(),
            rollback_stack: Vec::new(),
        }
    }

    /// Store name
    #[inline]
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.config.store_name
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register one step
    ///
    /// # Errors
    /// - [`MigrationError::InvalidVersion`] for version zero
    /// - [`MigrationError::DuplicateVersion`] under [`DuplicatePolicy::Reject`]
    pub fn add_migration(&mut self, step: MigrationStep<S>) -> Result<(), MigrationError> {
        self.check_registrable(step.version(), &HashSet::new())?;
        self.insert(step);
        Ok(())
    }

    /// Register several steps
    ///
    /// All-or-nothing: if any step is rejected, none are registered.
    ///
    /// # Errors
    /// Same as [`add_migration`](Self::add_migration), including duplicates
    /// within the batch itself
    pub fn add_migrations<I>(&mut self, steps: I) -> Result<(), MigrationError>
    where
        I: IntoIterator<Item = MigrationStep<S>>,
    {
        let steps: Vec<_> = steps.into_iter().collect();
        let mut batch = HashSet::with_capacity(steps.len());
        for step in &steps {
            self.check_registrable(step.version(), &batch)?;
            batch.insert(step.version());
        }
        for step in steps {
            self.insert(step);
        }
        Ok(())
    }

    fn check_registrable(
        &self,
        version: Version,
        batch: &HashSet<Version>,
    ) -> Result<(), MigrationError> {
        if version == 0 {
            return Err(MigrationError::InvalidVersion(version));
        }
        let taken = self.migrations.contains_key(&version) || batch.contains(&version);
        if taken && self.config.duplicate_policy == DuplicatePolicy::Reject {
            return Err(MigrationError::DuplicateVersion(version));
        }
        Ok(())
    }

    fn insert(&mut self, step: MigrationStep<S>) {
        let version = step.version();
        if let Some(previous) = self.migrations.insert(version, step) {
            tracing::warn!(
                store = %self.config.store_name,
                version,
                replaced = previous.description(),
                "Replaced registered migration"
            );
        } else {
            tracing::debug!(store = %self.config.store_name, version, "Registered migration");
        }
    }

    /// Check if a version is registered
    #[inline]
    #[must_use]
    pub fn has_migration(&self, version: Version) -> bool {
        self.migrations.contains_key(&version)
    }

    /// Look up a registered step
    #[inline]
    #[must_use]
    pub fn get(&self, version: Version) -> Option<&MigrationStep<S>> {
        self.migrations.get(&version)
    }

    /// Number of registered steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Highest registered version
    #[inline]
    #[must_use]
    pub fn latest_version(&self) -> Option<Version> {
        self.migrations.keys().next_back().copied()
    }

    /// Bring `state` from `from` up to `to`
    ///
    /// Never fails loudly: every step failure is folded into the returned
    /// result. `state` itself is left untouched.
    pub fn migrate(&mut self, state: &S, from: Version, to: Version) -> MigrationResult<S> {
        if from >= to {
            return MigrationResult::unchanged(state.clone());
        }

        let pending: Vec<MigrationStep<S>> = self
            .migrations
            .range((Bound::Excluded(from), Bound::Included(to)))
            .map(|(_, step)| step.clone())
            .collect();

        if pending.is_empty() {
            tracing::debug!(store = %self.config.store_name, from, to, "No migrations in range");
            return MigrationResult::unchanged(state.clone());
        }

        tracing::info!(
            store = %self.config.store_name,
            from,
            to,
            steps = pending.len(),
            "Running migrations"
        );

        let mut working = state.clone();
        let mut result = MigrationResult::unchanged(state.clone());

        for step in &pending {
            let version = step.version();

            if !self.run_validate(step, &working) {
                let message = format!(
                    "Migration {version} ({}) validation failed",
                    step.description()
                );
                if self.record_failure(&mut result, step, FailureKind::Validation, message) {
                    break;
                }
                continue;
            }

            self.rollback_stack.push(Checkpoint {
                version,
                state: working.clone(),
            });

            let ctx = MigrationContext::new(from, to, self.config.store_name.clone());
            let input = working.clone();
            match self.invoke(|| step.apply_up(input, &ctx)) {
                Ok(next) => {
                    tracing::debug!(store = %self.config.store_name, version, "Applied migration");
                    working = next;
                    result.applied_migrations.push(version);
                }
                Err(err) => {
                    let message = format!(
                        "Migration {version} ({}) failed: {err}",
                        step.description()
                    );
                    if self.record_failure(&mut result, step, FailureKind::Transformation, message)
                    {
                        break;
                    }
                }
            }
        }

        result.migrated_state = working;

        if result.success {
            tracing::info!(
                store = %self.config.store_name,
                applied = ?result.applied_migrations,
                skipped = result.warnings.len(),
                "Migrations complete"
            );
        }

        result
    }

    /// Records a failed step; returns `true` when the run must halt
    fn record_failure(
        &self,
        result: &mut MigrationResult<S>,
        step: &MigrationStep<S>,
        kind: FailureKind,
        message: String,
    ) -> bool {
        let version = step.version();
        let critical = step.is_critical();

        result.errors.push(message.clone());
        result.failures.push(StepFailure {
            version,
            kind,
            critical,
            message: message.clone(),
        });

        if critical {
            tracing::error!(store = %self.config.store_name, version, %kind, "{message}");
            result.success = false;
            return true;
        }

        tracing::warn!(store = %self.config.store_name, version, %kind, "{message}");
        result.warnings.push(format!(
            "Skipped non-critical migration {version} ({}) after {kind} failure",
            step.description()
        ));
        false
    }

    fn run_validate(&self, step: &MigrationStep<S>, state: &S) -> bool {
        if !self.config.catch_panics {
            return step.validates(state);
        }
        panic::catch_unwind(AssertUnwindSafe(|| step.validates(state))).unwrap_or(false)
    }

    fn invoke<F>(&self, f: F) -> Result<S, StepError>
    where
        F: FnOnce() -> Result<S, StepError>,
    {
        if !self.config.catch_panics {
            return f();
        }
        panic::catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|payload| Err(StepError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Roll back to `target`, best effort
    ///
    /// Returns `None` when no checkpoint at or below `target` exists.
    pub fn rollback(&mut self, target: Version) -> Option<S> {
        self.rollback_with_report(target).map(|report| report.state)
    }

    /// Roll back to `target`, reporting skipped and failed `down` transforms
    ///
    /// Starts from the most recent checkpoint at or below `target`, applies the
    /// registered `down` of every checkpoint above `target` (highest first),
    /// then drops those checkpoints from the stack.
    pub fn rollback_with_report(&mut self, target: Version) -> Option<RollbackReport<S>> {
        let floor = self
            .rollback_stack
            .iter()
            .rposition(|cp| cp.version <= target)?;

        let mut above: Vec<Version> = self
            .rollback_stack
            .iter()
            .rev()
            .filter(|cp| cp.version > target)
            .map(|cp| cp.version)
            .collect();
        above.sort_unstable_by_key(|v| Reverse(*v));

        let from = above.first().copied().unwrap_or(target);
        let ctx = MigrationContext::new(from, target, self.config.store_name.clone());

        let mut report = RollbackReport {
            state: self.rollback_stack[floor].state.clone(),
            restored_from: self.rollback_stack[floor].version,
            undone: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        };

        for version in above {
            let Some(step) = self.migrations.get(&version).filter(|s| s.has_down()) else {
                report.skipped.push(version);
                report
                    .warnings
                    .push(format!("Migration {version} has no down transform"));
                continue;
            };

            let input = report.state.clone();
            let outcome = self.invoke(|| {
                step.apply_down(input, &ctx)
                    .unwrap_or_else(|| Err(StepError::failed("down transform missing")))
            });
            match outcome {
                Ok(next) => {
                    report.state = next;
                    report.undone.push(version);
                }
                Err(err) => {
                    tracing::warn!(store = %self.config.store_name, version, error = %err, "Down migration failed");
                    report
                        .warnings
                        .push(format!("Migration {version} ({}) down failed: {err}", step.description()));
                }
            }
        }

        self.rollback_stack.retain(|cp| cp.version <= target);

        tracing::info!(
            store = %self.config.store_name,
            target,
            undone = ?report.undone,
            skipped = ?report.skipped,
            "Rolled back"
        );

        Some(report)
    }

    /// Drop all rollback checkpoints
    #[inline]
    pub fn clear_rollback_stack(&mut self) {
        self.rollback_stack.clear();
    }

    /// Current rollback checkpoints, oldest first
    #[inline]
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint<S>] {
        &self.rollback_stack
    }

    /// Versions of the current checkpoints, oldest first
    #[inline]
    #[must_use]
    pub fn checkpoint_versions(&self) -> Vec<Version> {
        self.rollback_stack.iter().map(|cp| cp.version).collect()
    }

    /// Registry diagnostics
    #[must_use]
    pub fn migration_info(&self) -> MigrationInfo {
        let steps: Vec<StepInfo> = self
            .migrations
            .values()
            .map(|step| StepInfo {
                version: step.version(),
                description: step.description().to_string(),
                critical: step.is_critical(),
                has_down: step.has_down(),
                has_validate: step.has_validate(),
            })
            .collect();

        MigrationInfo {
            total: steps.len(),
            versions: self.migrations.keys().copied().collect(),
            latest: self.latest_version(),
            steps,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn push_step(version: Version, log: Arc<Mutex<Vec<Version>>>) -> MigrationStep<Vec<Version>> {
        MigrationStep::new(version, format!("push {version}"), move |mut s: Vec<Version>, _| {
            log.lock().unwrap().push(version);
            s.push(version);
            Ok(s)
        })
    }

    fn failing_step(version: Version) -> MigrationStep<Vec<Version>> {
        MigrationStep::new(version, "explode", |_, _| Err(StepError::failed("boom")))
    }

    fn manager_with(steps: Vec<MigrationStep<Vec<Version>>>) -> MigrationManager<Vec<Version>> {
        let mut manager = MigrationManager::new("test");
        manager.add_migrations(steps).unwrap();
        manager
    }

    #[test]
    fn same_version_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![push_step(1, log.clone())]);

        let result = manager.migrate(&vec![9], 1, 1);
        assert!(result.success);
        assert_eq!(result.migrated_state, vec![9]);
        assert!(result.applied_migrations.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn downgrade_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![push_step(1, log.clone())]);

        let result = manager.migrate(&vec![], 3, 1);
        assert!(result.success);
        assert!(result.applied_migrations.is_empty());
        assert!(manager.checkpoints().is_empty());
    }

    #[test]
    fn applies_in_ascending_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = MigrationManager::new("test");
        manager.add_migration(push_step(3, log.clone())).unwrap();
        manager.add_migration(push_step(1, log.clone())).unwrap();
        manager.add_migration(push_step(2, log.clone())).unwrap();

        let result = manager.migrate(&vec![], 0, 3);
        assert!(result.success);
        assert_eq!(result.applied_migrations, vec![1, 2, 3]);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(result.migrated_state, vec![1, 2, 3]);
    }

    #[test]
    fn selects_only_versions_in_range() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![
            push_step(1, log.clone()),
            push_step(2, log.clone()),
            push_step(3, log.clone()),
            push_step(4, log.clone()),
        ]);

        let result = manager.migrate(&vec![], 1, 3);
        assert_eq!(result.applied_migrations, vec![2, 3]);
    }

    #[test]
    fn critical_failure_halts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![
            push_step(1, log.clone()),
            failing_step(2).critical(),
            push_step(3, log.clone()),
        ]);

        let result = manager.migrate(&vec![], 0, 3);
        assert!(!result.success);
        assert_eq!(result.applied_migrations, vec![1]);
        assert_eq!(result.migrated_state, vec![1]);
        assert!(result.errors.iter().any(|e| e.contains("Migration 2")));
        assert_eq!(result.halted_at(), Some(2));
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn non_critical_failure_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![
            push_step(1, log.clone()),
            failing_step(2),
            push_step(3, log.clone()),
        ]);

        let result = manager.migrate(&vec![], 0, 3);
        assert!(result.success);
        assert_eq!(result.applied_migrations, vec![1, 3]);
        assert_eq!(result.migrated_state, vec![1, 3]);
        assert!(!result.warnings.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn validation_gates_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let gated = MigrationStep::new(1, "gated", move |s: Vec<Version>, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(s)
        })
        .with_validate(|_| false);

        let mut manager = manager_with(vec![gated]);
        let result = manager.migrate(&vec![], 0, 1);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result.success);
        assert_eq!(result.failures[0].kind, FailureKind::Validation);
        assert_eq!(result.warnings.len(), 1);
        assert!(manager.checkpoints().is_empty());
    }

    #[test]
    fn critical_validation_failure_halts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![
            push_step(1, log.clone()),
            push_step(2, log.clone()).with_validate(|_| false).critical(),
            push_step(3, log.clone()),
        ]);

        let result = manager.migrate(&vec![], 0, 3);
        assert!(!result.success);
        assert_eq!(result.applied_migrations, vec![1]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn panicking_step_is_captured() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let panicking = MigrationStep::new(2, "panics", |_: Vec<Version>, _| -> Result<Vec<Version>, StepError> {
            panic!("bad state")
        });
        let mut manager = manager_with(vec![push_step(1, log.clone()), panicking, push_step(3, log)]);

        let result = manager.migrate(&vec![], 0, 3);
        assert!(result.success);
        assert_eq!(result.applied_migrations, vec![1, 3]);
        assert!(result.errors[0].contains("bad state"));
    }

    #[test]
    #[should_panic(expected = "bad state")]
    fn panics_propagate_when_capture_disabled() {
        let mut manager = MigrationManager::<Vec<Version>>::with_config(
            ManagerConfig::new("test").with_catch_panics(false),
        );
        manager
            .add_migration(MigrationStep::new(1, "panics", |_: Vec<Version>, _| -> Result<Vec<Version>, StepError> {
                panic!("bad state")
            }))
            .unwrap();

        let _ = manager.migrate(&vec![], 0, 1);
    }

    #[test]
    fn context_carries_whole_run_bounds() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut manager = MigrationManager::<Vec<Version>>::new("prefs");
        for version in 1..=2 {
            let seen = seen.clone();
            manager
                .add_migration(MigrationStep::new(version, "ctx", move |s, ctx| {
                    seen.lock()
                        .unwrap()
                        .push((ctx.from_version, ctx.to_version, ctx.store_name.clone()));
                    Ok(s)
                }))
                .unwrap();
        }

        manager.migrate(&vec![], 0, 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(f, t, n)| *f == 0 && *t == 2 && n == "prefs"));
    }

    #[test]
    fn checkpoints_hold_pre_step_state() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![push_step(1, log.clone()), push_step(2, log)]);

        manager.migrate(&vec![], 0, 2);
        let checkpoints = manager.checkpoints();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].state, Vec::<Version>::new());
        assert_eq!(checkpoints[1].state, vec![1]);
    }

    #[test]
    fn duplicate_rejected_by_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![push_step(1, log.clone())]);

        let err = manager.add_migration(push_step(1, log)).unwrap_err();
        assert_eq!(err, MigrationError::DuplicateVersion(1));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn duplicate_within_batch_registers_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = MigrationManager::new("test");
        let result = manager.add_migrations(vec![
            push_step(1, log.clone()),
            push_step(2, log.clone()),
            push_step(2, log),
        ]);
        assert_eq!(result, Err(MigrationError::DuplicateVersion(2)));
        assert!(manager.is_empty());
    }

    #[test]
    fn duplicate_replaced_when_configured() {
        let config = ManagerConfig::new("test").with_duplicate_policy(DuplicatePolicy::Replace);
        let mut manager = MigrationManager::<Vec<Version>>::with_config(config);
        manager
            .add_migration(MigrationStep::new(1, "first", |s, _| Ok(s)))
            .unwrap();
        manager
            .add_migration(MigrationStep::new(1, "second", |s, _| Ok(s)))
            .unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(1).unwrap().description(), "second");
    }

    #[test]
    fn version_zero_rejected() {
        let mut manager = MigrationManager::<u32>::new("test");
        let result = manager.add_migration(MigrationStep::new(0, "zero", |s, _| Ok(s)));
        assert_eq!(result, Err(MigrationError::InvalidVersion(0)));
    }

    #[test]
    fn rollback_without_checkpoint_is_none() {
        let mut manager = MigrationManager::<u32>::new("test");
        assert!(manager.rollback(0).is_none());
    }

    #[test]
    fn rollback_reports_missing_down() {
        let mut manager = MigrationManager::<Vec<Version>>::new("test");
        manager
            .add_migrations(vec![
                MigrationStep::new(1, "one", |mut s: Vec<Version>, _| {
                    s.push(1);
                    Ok(s)
                }),
                MigrationStep::new(2, "two", |mut s: Vec<Version>, _| {
                    s.push(2);
                    Ok(s)
                }),
            ])
            .unwrap();

        manager.migrate(&vec![], 0, 2);
        let report = manager.rollback_with_report(1).unwrap();
        assert_eq!(report.state, Vec::<Version>::new());
        assert_eq!(report.skipped, vec![2]);
        assert!(report.undone.is_empty());
        assert_eq!(report.restored_from, 1);
        assert_eq!(report.state_version(), 0);
        assert_eq!(manager.checkpoint_versions(), vec![1]);
    }

    #[test]
    fn failed_down_is_reported_and_skipped() {
        let mut manager = MigrationManager::<Vec<Version>>::new("test");
        manager
            .add_migrations(vec![
                MigrationStep::new(1, "one", |s: Vec<Version>, _| Ok(s)),
                MigrationStep::new(2, "two", |s: Vec<Version>, _| Ok(s))
                    .with_down(|_, _| Err(StepError::failed("cannot undo"))),
            ])
            .unwrap();

        manager.migrate(&vec![7], 0, 2);
        let report = manager.rollback_with_report(1).unwrap();
        assert_eq!(report.state, vec![7]);
        assert!(report.warnings[0].contains("cannot undo"));
    }

    #[test]
    fn clear_rollback_stack_empties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(vec![push_step(1, log)]);
        manager.migrate(&vec![], 0, 1);
        assert_eq!(manager.checkpoint_versions(), vec![1]);

        manager.clear_rollback_stack();
        assert!(manager.checkpoints().is_empty());
        assert!(manager.rollback(1).is_none());
    }

    #[test]
    fn migration_info_lists_metadata() {
        let mut manager = MigrationManager::<u32>::new("test");
        manager
            .add_migrations(vec![
                MigrationStep::new(2, "two", |s, _| Ok(s)).with_down(|s, _| Ok(s)),
                MigrationStep::new(1, "one", |s, _| Ok(s)).critical().with_validate(|_| true),
            ])
            .unwrap();

        let info = manager.migration_info();
        assert_eq!(info.total, 2);
        assert_eq!(info.versions, vec![1, 2]);
        assert_eq!(info.latest, Some(2));
        assert!(info.steps[0].critical);
        assert!(info.steps[0].has_validate);
        assert!(!info.steps[0].has_down);
        assert!(info.steps[1].has_down);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{"store_name": "ui"}"#).unwrap();
        assert_eq!(config.store_name, "ui");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(config.catch_panics);
    }
}
