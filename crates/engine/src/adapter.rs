//! The adapter contract consumed by the engine.
//!
//! One adapter per resource kind, selected by kind tag. The capability set
//! is {read, diff, apply, facts} plus name→id resolution for reference
//! fields. Adapters own every wire call; the engine never blocks outside
//! delegated adapter calls.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use stratus_core::{AdapterResult, Changeset, Observed, Resource};

/// Per-kind reconciliation capabilities.
///
/// `read` and `apply` are the only suspension points of a resource's cycle;
/// `diff` must be pure and deterministic.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// The kind tag this adapter serves.
    fn kind(&self) -> &str;

    /// Observe the remote object backing `resource`.
    ///
    /// Returns `Err(AdapterError::NotFound)` when the remote object does
    /// not exist; the engine records an absent observation for it.
    async fn read(&self, resource: &Resource) -> AdapterResult<Observed>;

    /// Compute field-level drift between the recorded observation and
    /// `desired` (the declared attributes, reference fields already
    /// normalized to remote ids).
    ///
    /// The default delegates to [`Changeset::compute`]. Override only to
    /// post-process the changeset; overrides must stay pure.
    fn diff(&self, resource: &Resource, desired: &IndexMap<String, Value>) -> Changeset {
        match &resource.observed {
            Some(observed) => Changeset::compute(observed, desired, resource.purged),
            None => Changeset::new(),
        }
    }

    /// Resolve a declared reference `name` in `field` to the remote id the
    /// observed state exposes, so the diff compares at id level.
    ///
    /// The default is identity resolution: the comparison value is the
    /// name itself, which is correct for adapters whose observations carry
    /// names. Adapters observing remote ids override this with a lookup;
    /// `Ok(None)` means the name could not be resolved and the field's
    /// unresolved policy applies.
    async fn resolve(
        &self,
        resource: &Resource,
        field: &str,
        name: &str,
    ) -> AdapterResult<Option<String>> {
        let _ = (resource, field);
        Ok(Some(name.to_string()))
    }

    /// Converge the remote object toward the declared state.
    ///
    /// `changes` is never empty and carries at most an existence
    /// transition (never an existence transition mixed with attribute
    /// edits). Returns whether anything was changed remotely.
    /// `Err(AdapterError::Skip)` aborts this resource for the pass without
    /// failing the batch.
    async fn apply(&self, resource: &Resource, changes: &Changeset) -> AdapterResult<bool>;

    /// Derived facts about a converged resource (discovered addresses,
    /// resolved ids), keyed by caller-chosen names.
    ///
    /// Best effort: the engine logs and swallows errors, reporting an
    /// empty mapping instead.
    async fn facts(&self, resource: &Resource) -> AdapterResult<BTreeMap<String, String>> {
        let _ = resource;
        Ok(BTreeMap::new())
    }
}

/// Adapter lookup by kind tag.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind tag.
    pub fn register(mut self, adapter: Arc<dyn ResourceAdapter>) -> Self {
        self.adapters.insert(adapter.kind().to_string(), adapter);
        self
    }

    /// Look up the adapter for a kind.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn ResourceAdapter>> {
        self.adapters.get(kind).cloned()
    }

    /// Whether an adapter is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.adapters.contains_key(kind)
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
