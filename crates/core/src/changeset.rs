//! Field-level drift between observed and desired state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{Existence, Observed};

/// Changeset key that signals an existence transition. Takes exclusive
/// precedence over attribute edits in the same apply call.
pub const PURGED_FIELD: &str = "purged";

/// A single field difference: what the remote object has now, what is
/// declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Observed value.
    pub current: Value,
    /// Declared value.
    pub desired: Value,
}

/// Existence transition encoded by the [`PURGED_FIELD`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExistenceTransition {
    /// The object is absent and must be created.
    Create,
    /// The object is present and must be deleted.
    Delete,
}

/// The minimal set of differing fields between observed and desired state.
///
/// An empty changeset means no action is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    entries: IndexMap<String, FieldChange>,
}

impl Changeset {
    /// Create an empty changeset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a differing field.
    pub fn insert(&mut self, field: impl Into<String>, current: Value, desired: Value) {
        self.entries
            .insert(field.into(), FieldChange { current, desired });
    }

    /// Look up a field difference.
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.entries.get(field)
    }

    /// Whether `field` differs.
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Remove a field difference, returning it.
    pub fn remove(&mut self, field: &str) -> Option<FieldChange> {
        self.entries.shift_remove(field)
    }

    /// Whether no field differs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of differing fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Differing field names, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate differing fields with their change pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The existence transition carried by this changeset, if any.
    pub fn existence_transition(&self) -> Option<ExistenceTransition> {
        let change = self.entries.get(PURGED_FIELD)?;
        match (change.current.as_bool(), change.desired.as_bool()) {
            (Some(true), Some(false)) => Some(ExistenceTransition::Create),
            (Some(false), Some(true)) => Some(ExistenceTransition::Delete),
            _ => None,
        }
    }

    /// Reduce the changeset to the existence transition alone.
    ///
    /// An existence transition cannot be combined with attribute edits in
    /// one apply call; attribute edits are picked up on the next pass after
    /// a re-read.
    pub fn existence_only(&self) -> Self {
        let mut reduced = Self::new();
        if let Some(change) = self.entries.get(PURGED_FIELD) {
            reduced.insert(PURGED_FIELD, change.current.clone(), change.desired.clone());
        }
        reduced
    }

    /// Compute the changeset between an observation and declared state.
    ///
    /// Pure and deterministic; neither side is mutated. When existence
    /// itself differs, only the [`PURGED_FIELD`] entry is produced.
    /// Declared fields missing from the observed mirror are treated as
    /// unchanged, so an adapter that cannot observe a field never produces
    /// a false-positive diff for it.
    pub fn compute(
        observed: &Observed,
        desired: &IndexMap<String, Value>,
        desired_purged: bool,
    ) -> Self {
        let mut changes = Self::new();
        let current_purged = observed.existence != Existence::Present;

        if current_purged != desired_purged {
            changes.insert(
                PURGED_FIELD,
                Value::Bool(current_purged),
                Value::Bool(desired_purged),
            );
            return changes;
        }
        if desired_purged {
            // Both sides agree the object should be gone.
            return changes;
        }

        for (field, desired_value) in desired {
            let Some(current_value) = observed.attributes.get(field) else {
                continue;
            };
            if current_value != desired_value {
                changes.insert(field.clone(), current_value.clone(), desired_value.clone());
            }
        }
        changes
    }

    /// Drop a set-valued field whose add/remove decomposition is empty.
    ///
    /// Collection fields converge element-wise, so two lists holding the
    /// same elements in different order or with different adapter-internal
    /// ids are not drift.
    pub fn prune_set_field<F>(&mut self, field: &str, eq: F)
    where
        F: Fn(&Value, &Value) -> bool,
    {
        let Some(change) = self.entries.get(field) else {
            return;
        };
        let (Some(current), Some(desired)) = (change.current.as_array(), change.desired.as_array())
        else {
            return;
        };
        if SetDelta::decompose(current, desired, eq).is_empty() {
            self.entries.shift_remove(field);
        }
    }
}

/// Add/remove decomposition of a set-valued field change.
///
/// Unmatched desired elements are additions, unmatched observed elements are
/// removals; matched elements are never touched. There is no wholesale
/// replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetDelta {
    /// Elements to create remotely.
    pub add: Vec<Value>,
    /// Elements to remove remotely.
    pub remove: Vec<Value>,
}

impl SetDelta {
    /// Decompose current and desired element lists under `eq`.
    pub fn decompose<F>(current: &[Value], desired: &[Value], eq: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool,
    {
        let mut remove: Vec<Value> = current.to_vec();
        let mut add = Vec::new();

        for want in desired {
            match remove.iter().position(|have| eq(have, want)) {
                Some(matched) => {
                    remove.remove(matched);
                }
                None => add.push(want.clone()),
            }
        }

        Self { add, remove }
    }

    /// Decompose a recorded field change, if both sides are lists.
    pub fn from_change<F>(change: &FieldChange, eq: F) -> Option<Self>
    where
        F: Fn(&Value, &Value) -> bool,
    {
        let current = change.current.as_array()?;
        let desired = change.desired.as_array()?;
        Some(Self::decompose(current, desired, eq))
    }

    /// Whether nothing needs to be added or removed.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Structural equality for collection elements.
///
/// Object keys prefixed with `"__"` are adapter-internal (remote rule ids
/// and the like) and are ignored; everything else must match. Non-object
/// values compare directly.
pub fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a.as_object(), b.as_object()) {
        (Some(a), Some(b)) => {
            let visible = |m: &serde_json::Map<String, Value>| {
                m.iter()
                    .filter(|(k, _)| !k.starts_with("__"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            };
            let mut a_visible = visible(a);
            let mut b_visible = visible(b);
            a_visible.sort_by(|(x, _), (y, _)| x.cmp(y));
            b_visible.sort_by(|(x, _), (y, _)| x.cmp(y));
            a_visible == b_visible
        }
        _ => a == b,
    }
}
