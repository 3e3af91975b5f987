//! Dependency layer of the Stratus reconciliation core.
//!
//! Given the complete batch of declared resources for one pass, this crate:
//!
//! 1. infers the implicit `requires` edges that semantic relationships
//!    demand, beyond whatever edges the declaring system already attached
//!    ([`DependencyBuilder`]), driven by per-kind [`KindSchema`] data;
//! 2. validates referential integrity: every referenced name and every
//!    `requires` target must exist in the batch;
//! 3. produces a deterministic execution order consistent with the
//!    `requires` partial order ([`DependencyGraph::execution_order`]), with
//!    ties broken by declaration order.
//!
//! The builder never contacts external infrastructure; everything here is
//! computed from the batch alone.

pub mod builder;
pub mod graph;
pub mod schema;

pub use builder::DependencyBuilder;
pub use graph::DependencyGraph;
pub use schema::{KindSchema, RefCardinality, RefField, SchemaRegistry, UnresolvedPolicy};
