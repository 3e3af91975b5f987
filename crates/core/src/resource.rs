//! Declared and observed resource state.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Identity of a resource instance: a kind tag plus a human-meaningful name.
///
/// The remote id assigned by the infrastructure is not part of the identity;
/// it is discovered during reconciliation and stored on the resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource kind tag, e.g. `"network"`.
    pub kind: String,
    /// Declared name, unique per kind within one batch.
    pub name: String,
}

impl ResourceId {
    /// Create a new resource identity.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.name)
    }
}

/// Remote existence of a resource. `Unknown` until the first read of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Existence {
    /// Not yet observed.
    Unknown,
    /// The remote object exists.
    Present,
    /// The remote object does not exist.
    Absent,
}

/// State reported by an adapter `read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observed {
    /// Whether the remote object exists.
    pub existence: Existence,
    /// Observed attribute mirror, one entry per field the adapter could
    /// observe. Fields missing here are treated as unchanged by the diff.
    pub attributes: IndexMap<String, Value>,
    /// Remote id of the object, when known.
    pub external_id: Option<String>,
}

impl Observed {
    /// An observation of an existing remote object with no attributes yet.
    pub fn present() -> Self {
        Self {
            existence: Existence::Present,
            attributes: IndexMap::new(),
            external_id: None,
        }
    }

    /// An observation that the remote object does not exist.
    pub fn absent() -> Self {
        Self {
            existence: Existence::Absent,
            attributes: IndexMap::new(),
            external_id: None,
        }
    }

    /// Attach an observed attribute value.
    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Attach the remote id.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Look up an observed attribute.
    pub fn attr(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

/// One declared resource instance in a reconciliation batch.
///
/// Constructed when the batch is assembled, mutated in place by `read`, and
/// discarded with the pass. Never shared across passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Identity of this instance.
    pub id: ResourceId,
    /// Declared existence: `true` means the remote object must not exist.
    pub purged: bool,
    /// Unmanaged resources are reported without any adapter call.
    pub managed: bool,
    /// Remote id, once known.
    pub external_id: Option<String>,
    /// Declared attribute values in declaration order. Immutable for the
    /// duration of a pass.
    pub attributes: IndexMap<String, Value>,
    /// Observed state, populated by `read`.
    pub observed: Option<Observed>,
    /// Resources that must be reconciled before this one.
    pub requires: BTreeSet<ResourceId>,
}

impl Resource {
    /// Create a new managed, non-purged resource with no attributes.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            purged: false,
            managed: true,
            external_id: None,
            attributes: IndexMap::new(),
            observed: None,
            requires: BTreeSet::new(),
        }
    }

    /// Attach a declared attribute value.
    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Declare that the remote object must not exist.
    pub fn purge(mut self) -> Self {
        self.purged = true;
        self
    }

    /// Mark the resource as unmanaged.
    pub fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    /// Declare an explicit ordering requirement.
    pub fn with_requirement(mut self, id: ResourceId) -> Self {
        self.requires.insert(id);
        self
    }

    /// Add an ordering requirement in place. Used by the dependency builder.
    pub fn add_requirement(&mut self, id: ResourceId) {
        self.requires.insert(id);
    }

    /// Look up a declared attribute.
    pub fn attr(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Current knowledge about the remote object's existence.
    pub fn existence(&self) -> Existence {
        self.observed
            .as_ref()
            .map_or(Existence::Unknown, |observed| observed.existence)
    }

    /// Record the result of an adapter read.
    pub fn record_observation(&mut self, observed: Observed) {
        if observed.external_id.is_some() {
            self.external_id = observed.external_id.clone();
        }
        self.observed = Some(observed);
    }
}

/// The batch of declared resources for one reconciliation pass.
///
/// Keeps declaration order; duplicate identities are rejected at insert.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    resources: Vec<Resource>,
    index: HashMap<ResourceId, usize>,
}

impl ResourceSet {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the batch.
    pub fn push(&mut self, resource: Resource) -> Result<()> {
        if self.index.contains_key(&resource.id) {
            return Err(Error::DuplicateResource {
                id: resource.id.clone(),
            });
        }
        self.index.insert(resource.id.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Look up a resource by identity.
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.index.get(id).and_then(|&i| self.resources.get(i))
    }

    /// Look up a resource by identity, mutably.
    pub fn get_mut(&mut self, id: &ResourceId) -> Option<&mut Resource> {
        let i = *self.index.get(id)?;
        self.resources.get_mut(i)
    }

    /// Whether the batch declares `id`.
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    /// Declaration position of `id`, used for deterministic tie-breaks.
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Iterate resources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Identities in declaration order.
    pub fn ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(|r| r.id.clone()).collect()
    }
}
