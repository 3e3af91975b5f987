//! Core model for desired-state reconciliation.
//!
//! This crate holds the pure data layer shared by the graph builder and the
//! reconciliation engine:
//!
//! - **Resource Model**: a declared resource instance with identity, desired
//!   attributes, observed state and `requires` edges ([`Resource`],
//!   [`ResourceSet`])
//! - **Changeset Model**: field-level drift between observed and desired
//!   state, with add/remove decomposition for set-valued fields
//!   ([`Changeset`], [`SetDelta`])
//! - **Error taxonomy**: configuration errors ([`Error`]) and the adapter
//!   boundary type ([`AdapterError`]) where skip and not-found are data,
//!   not failures
//! - **Outcomes**: the terminal per-resource status of one pass
//!   ([`Outcome`])
//!
//! Nothing in this crate performs I/O or touches an async runtime.

pub mod changeset;
pub mod error;
pub mod outcome;
pub mod resource;

pub use changeset::{
    structural_eq, Changeset, ExistenceTransition, FieldChange, SetDelta, PURGED_FIELD,
};
pub use error::{AdapterError, AdapterResult, Error, Result};
pub use outcome::Outcome;
pub use resource::{Existence, Observed, Resource, ResourceId, ResourceSet};
