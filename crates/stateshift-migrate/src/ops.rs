//! Whole-object field operations for JSON snapshots
//!
//! [`FieldOp`] is a small declarative vocabulary for the common shape changes
//! between releases: adding defaults, renaming, removing and nesting. Ops are
//! serde-serializable so they can live in plan files, and most of them know
//! their own inverse so a `down` can be derived automatically.

use crate::error::StepError;
use crate::step::{MigrationContext, MigrationStep};
use crate::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative field-level transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldOp {
    /// Insert `key` only when absent
    AddField {
        /// Field name
        key: String,
        /// Default value
        value: Value,
    },

    /// Insert or overwrite `key`
    SetField {
        /// Field name
        key: String,
        /// New value
        value: Value,
    },

    /// Drop `key`
    RemoveField {
        /// Field name
        key: String,
    },

    /// Move `from` to `to`, overwriting `to`
    ///
    /// No-op when `from` is absent.
    RenameField {
        /// Old name
        from: String,
        /// New name
        to: String,
    },

    /// Deep-insert every key missing from the snapshot
    MergeDefaults {
        /// Default object
        defaults: Value,
    },

    /// Apply `ops` inside the object at `key`, creating it when missing
    ///
    /// With `prune` set the container is never created: a missing one is
    /// skipped and one left empty is removed. This is the inverse form.
    Nested {
        /// Field holding the nested object
        key: String,
        /// Operations for the nested object
        ops: Vec<FieldOp>,
        /// Skip missing and drop emptied containers
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        prune: bool,
    },
}

impl FieldOp {
    /// `add_field` shorthand
    #[must_use]
    pub fn add(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::AddField {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `set_field` shorthand
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::SetField {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `remove_field` shorthand
    #[must_use]
    pub fn remove(key: impl Into<String>) -> Self {
        Self::RemoveField { key: key.into() }
    }

    /// `rename_field` shorthand
    #[must_use]
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::RenameField {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `nested` shorthand
    #[must_use]
    pub fn nested(key: impl Into<String>, ops: Vec<FieldOp>) -> Self {
        Self::Nested {
            key: key.into(),
            ops,
            prune: false,
        }
    }

    /// Apply to a snapshot
    ///
    /// # Errors
    /// Returns [`StepError::NotAnObject`] when the snapshot (or a nested
    /// target) is not a JSON object
    pub fn apply(&self, state: Value) -> Result<Value, StepError> {
        let mut map = into_object(state)?;
        self.apply_to(&mut map)?;
        Ok(Value::Object(map))
    }

    fn apply_to(&self, map: &mut Map<String, Value>) -> Result<(), StepError> {
        match self {
            Self::AddField { key, value } => {
                map.entry(key.clone()).or_insert_with(|| value.clone());
            }
            Self::SetField { key, value } => {
                map.insert(key.clone(), value.clone());
            }
            Self::RemoveField { key } => {
                map.remove(key);
            }
            Self::RenameField { from, to } => {
                if let Some(value) = map.remove(from) {
                    map.insert(to.clone(), value);
                }
            }
            Self::MergeDefaults { defaults } => match defaults {
                Value::Object(defaults) => merge_missing(map, defaults),
                other => {
                    return Err(StepError::NotAnObject {
                        found: kind_of(other),
                    })
                }
            },
            Self::Nested { key, ops, prune } => {
                if *prune && !map.contains_key(key) {
                    return Ok(());
                }
                let emptied = match map
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()))
                {
                    Value::Object(inner) => {
                        for op in ops {
                            op.apply_to(inner)?;
                        }
                        inner.is_empty()
                    }
                    other => {
                        return Err(StepError::invalid_value(
                            key.clone(),
                            format!("expected object, found {}", kind_of(other)),
                        ))
                    }
                };
                if *prune && emptied {
                    map.remove(key);
                }
            }
        }
        Ok(())
    }

    /// Op that undoes this one, where one exists
    ///
    /// `set_field`, `remove_field` and `merge_defaults` discard information
    /// and have no inverse. The inverse of `nested` prunes the container it
    /// may have created, so a container that was already present but empty
    /// does not survive the round trip.
    #[must_use]
    pub fn inverse(&self) -> Option<FieldOp> {
        match self {
            Self::AddField { key, .. } => Some(Self::RemoveField { key: key.clone() }),
            Self::RenameField { from, to } => Some(Self::RenameField {
                from: to.clone(),
                to: from.clone(),
            }),
            Self::Nested { key, ops, prune } => {
                let inverted = invert_all(ops)?;
                Some(Self::Nested {
                    key: key.clone(),
                    ops: inverted,
                    prune: !prune,
                })
            }
            Self::SetField { .. } | Self::RemoveField { .. } | Self::MergeDefaults { .. } => None,
        }
    }

    /// Check if [`inverse`](Self::inverse) is available
    #[inline]
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.inverse().is_some()
    }
}

/// Apply ops left to right
///
/// # Errors
/// Stops at the first op that fails
pub fn apply_all(ops: &[FieldOp], state: Value) -> Result<Value, StepError> {
    let mut map = into_object(state)?;
    for op in ops {
        op.apply_to(&mut map)?;
    }
    Ok(Value::Object(map))
}

/// Inverse of an op sequence: each inverse, in reverse order
#[must_use]
pub fn invert_all(ops: &[FieldOp]) -> Option<Vec<FieldOp>> {
    ops.iter().rev().map(FieldOp::inverse).collect()
}

/// Step transform rewriting one field's value
///
/// Absent fields are left alone.
pub fn transform_field<F>(
    key: impl Into<String>,
    f: F,
) -> impl Fn(Value, &MigrationContext) -> Result<Value, StepError> + Send + Sync + 'static
where
    F: Fn(Value) -> Result<Value, StepError> + Send + Sync + 'static,
{
    let key = key.into();
    move |state: Value, _ctx: &MigrationContext| {
        let mut map = into_object(state)?;
        if let Some(value) = map.remove(&key) {
            map.insert(key.clone(), f(value)?);
        }
        Ok(Value::Object(map))
    }
}

impl MigrationStep<Value> {
    /// Build a step from field ops
    ///
    /// When every op is reversible, a `down` applying the inverses is attached.
    #[must_use]
    pub fn from_ops(version: Version, description: impl Into<String>, ops: Vec<FieldOp>) -> Self {
        let down = invert_all(&ops);
        let step = Self::new(version, description, move |state, _| apply_all(&ops, state));
        match down {
            Some(inverse) => step.with_down(move |state, _| apply_all(&inverse, state)),
            None => step,
        }
    }
}

fn into_object(state: Value) -> Result<Map<String, Value>, StepError> {
    match state {
        Value::Object(map) => Ok(map),
        other => Err(StepError::NotAnObject {
            found: kind_of(&other),
        }),
    }
}

fn merge_missing(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match (target.get_mut(key), default) {
            (None, _) => {
                target.insert(key.clone(), default.clone());
            }
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_missing(existing, nested);
            }
            (Some(_), _) => {}
        }
    }
}

/// JSON kind name, for error messages
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
