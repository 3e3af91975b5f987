//! Error taxonomy for the reconciliation core.
//!
//! Two layers: [`Error`] for configuration problems detected before any
//! apply begins, and [`AdapterError`] for everything crossing the adapter
//! boundary, where "not found" and "skip this pass" are control flow rather
//! than failures.

use thiserror::Error;

use crate::resource::ResourceId;

/// Result type alias for configuration-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. Fatal for the affected resource and its
/// dependents; independent resources keep reconciling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A declared field names a resource that is not in this batch.
    #[error("{resource}: field '{field}' references {target_kind} '{name}' which is not declared in this batch")]
    DanglingReference {
        resource: ResourceId,
        field: String,
        target_kind: String,
        name: String,
    },

    /// An explicit `requires` edge points outside the batch.
    #[error("{resource}: requires {missing} which is not declared in this batch")]
    UnknownRequirement {
        resource: ResourceId,
        missing: ResourceId,
    },

    /// The same identity was declared twice.
    #[error("duplicate resource {id}")]
    DuplicateResource { id: ResourceId },

    /// The resource participates in a dependency cycle.
    #[error("{resource}: dependency cycle")]
    DependencyCycle { resource: ResourceId },

    /// No adapter is registered for the resource's kind.
    #[error("{resource}: no adapter registered for kind '{kind}'")]
    UnknownKind { resource: ResourceId, kind: String },

    /// Any other invalid declaration.
    #[error("{resource}: {reason}")]
    Configuration { resource: ResourceId, reason: String },
}

impl Error {
    /// Create a dangling reference error.
    pub fn dangling_reference(
        resource: ResourceId,
        field: impl Into<String>,
        target_kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::DanglingReference {
            resource,
            field: field.into(),
            target_kind: target_kind.into(),
            name: name.into(),
        }
    }

    /// Create an unknown requirement error.
    pub fn unknown_requirement(resource: ResourceId, missing: ResourceId) -> Self {
        Self::UnknownRequirement { resource, missing }
    }

    /// Create a dependency cycle error.
    pub fn dependency_cycle(resource: ResourceId) -> Self {
        Self::DependencyCycle { resource }
    }

    /// Create an unknown kind error.
    pub fn unknown_kind(resource: ResourceId, kind: impl Into<String>) -> Self {
        Self::UnknownKind {
            resource,
            kind: kind.into(),
        }
    }

    /// Create a generic configuration error.
    pub fn configuration(resource: ResourceId, reason: impl Into<String>) -> Self {
        Self::Configuration {
            resource,
            reason: reason.into(),
        }
    }

    /// The resource this error is attributed to.
    pub fn resource(&self) -> &ResourceId {
        match self {
            Self::DanglingReference { resource, .. }
            | Self::UnknownRequirement { resource, .. }
            | Self::DependencyCycle { resource }
            | Self::UnknownKind { resource, .. }
            | Self::Configuration { resource, .. } => resource,
            Self::DuplicateResource { id } => id,
        }
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Errors crossing the adapter boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// The remote object does not exist. Not a failure: `read` maps this to
    /// an absent observation.
    #[error("remote object not found")]
    NotFound,

    /// A precondition is not met yet; retry on the next pass. Never fails
    /// the batch.
    #[error("skipped: {0}")]
    Skip(String),

    /// More than one remote object matched a name lookup.
    #[error("ambiguous match: {0}")]
    Ambiguous(String),

    /// Unexpected remote failure. Fatal for this resource and its
    /// dependents for the current pass.
    #[error("{0}")]
    Failure(String),
}

impl AdapterError {
    /// Create a skip with a human-readable reason.
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }

    /// Create an ambiguous match error.
    pub fn ambiguous(what: impl Into<String>) -> Self {
        Self::Ambiguous(what.into())
    }

    /// Create a generic adapter failure.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }
}
