//! Kind schemas: which declared fields reference other resources.
//!
//! A schema is the data-driven form of per-kind dependency rules: "a subnet
//! requires its network and owning project", "a router requires each of its
//! attached subnets". The builder turns these into `requires` edges; the
//! engine uses the same schema to decide which fields need name→id
//! resolution before diffing and which fields diff element-wise.

use std::collections::HashMap;

/// How many resources a reference field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefCardinality {
    /// A single name, declared as a string.
    One,
    /// A list of names, declared as an array of strings or of objects
    /// carrying the name under an item key.
    Many,
}

/// What to do when a declared reference name cannot be resolved to a remote
/// id at diff time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Resolution failure fails the resource for this pass.
    #[default]
    Error,
    /// No comparison is possible; treat the field as unchanged.
    TreatAsUnchanged,
}

/// One declared field that references other resources by name.
#[derive(Debug, Clone)]
pub struct RefField {
    /// The declared field holding the reference.
    pub field: String,
    /// Kind of the referenced resource.
    pub target_kind: String,
    /// Single name or list of names.
    pub cardinality: RefCardinality,
    /// For `Many` over object lists: the key holding the referenced name.
    pub item_key: Option<String>,
    /// Required references to names missing from the batch are
    /// configuration errors; optional ones (owners) simply add no edge.
    pub required: bool,
    /// Diff-time behavior when the name cannot be resolved to a remote id.
    pub on_unresolved: UnresolvedPolicy,
}

/// Dependency and diff rules for one resource kind.
#[derive(Debug, Clone)]
pub struct KindSchema {
    /// The kind this schema describes.
    pub kind: String,
    /// Reference fields, in declaration order.
    pub refs: Vec<RefField>,
    /// Collection-valued fields that diff with add/remove decomposition.
    pub set_fields: Vec<String>,
}

impl KindSchema {
    /// Create an empty schema for `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            refs: Vec::new(),
            set_fields: Vec::new(),
        }
    }

    /// Optional reference to an owning resource (project, tenant). An edge
    /// is added only when the owner is declared in the batch; its absence
    /// is not an error.
    pub fn owner(mut self, field: impl Into<String>, target_kind: impl Into<String>) -> Self {
        self.refs.push(RefField {
            field: field.into(),
            target_kind: target_kind.into(),
            cardinality: RefCardinality::One,
            item_key: None,
            required: false,
            on_unresolved: UnresolvedPolicy::default(),
        });
        self
    }

    /// Required single reference: the named resource must be declared.
    pub fn reference(mut self, field: impl Into<String>, target_kind: impl Into<String>) -> Self {
        self.refs.push(RefField {
            field: field.into(),
            target_kind: target_kind.into(),
            cardinality: RefCardinality::One,
            item_key: None,
            required: true,
            on_unresolved: UnresolvedPolicy::default(),
        });
        self
    }

    /// Required list of references declared as an array of names.
    pub fn references(mut self, field: impl Into<String>, target_kind: impl Into<String>) -> Self {
        self.refs.push(RefField {
            field: field.into(),
            target_kind: target_kind.into(),
            cardinality: RefCardinality::Many,
            item_key: None,
            required: true,
            on_unresolved: UnresolvedPolicy::default(),
        });
        self
    }

    /// Required list of references declared as an array of objects, each
    /// naming its target under `item_key`.
    pub fn references_by_key(
        mut self,
        field: impl Into<String>,
        item_key: impl Into<String>,
        target_kind: impl Into<String>,
    ) -> Self {
        self.refs.push(RefField {
            field: field.into(),
            target_kind: target_kind.into(),
            cardinality: RefCardinality::Many,
            item_key: Some(item_key.into()),
            required: true,
            on_unresolved: UnresolvedPolicy::default(),
        });
        self
    }

    /// Mark a collection-valued field for add/remove diffing.
    pub fn set_field(mut self, field: impl Into<String>) -> Self {
        self.set_fields.push(field.into());
        self
    }

    /// Degrade an unresolvable reference on `field` to "unchanged" instead
    /// of failing the resource.
    pub fn tolerate_unresolved(mut self, field: &str) -> Self {
        for ref_field in &mut self.refs {
            if ref_field.field == field {
                ref_field.on_unresolved = UnresolvedPolicy::TreatAsUnchanged;
            }
        }
        self
    }

    /// Look up the reference rule for a field.
    pub fn ref_field(&self, field: &str) -> Option<&RefField> {
        self.refs.iter().find(|r| r.field == field)
    }

    /// Whether `field` diffs element-wise.
    pub fn is_set_field(&self, field: &str) -> bool {
        self.set_fields.iter().any(|f| f == field)
    }
}

/// Registry of kind schemas for one deployment model.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, KindSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any previous one for the same kind.
    pub fn register(mut self, schema: KindSchema) -> Self {
        self.schemas.insert(schema.kind.clone(), schema);
        self
    }

    /// Look up the schema for a kind. Kinds without a schema have no
    /// implicit dependencies.
    pub fn get(&self, kind: &str) -> Option<&KindSchema> {
        self.schemas.get(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
