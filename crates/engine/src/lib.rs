//! Reconciliation engine for the Stratus core.
//!
//! Drives convergence of a declared batch against live infrastructure:
//!
//! 1. the dependency builder adds implicit `requires` edges and validates
//!    referential integrity (from `stratus-graph`);
//! 2. a worker pool walks the batch respecting the dependency partial
//!    order — resources without a path between them reconcile concurrently;
//! 3. each resource runs the read → diff → apply cycle against its
//!    [`ResourceAdapter`], with skip/failure isolation per resource and
//!    dependency-failure propagation to dependents;
//! 4. outcomes and derived facts surface in a [`PassReport`].
//!
//! Adapter connection handles are shared through a credential-keyed,
//! TTL-bounded [`HandleCache`] that constructs at most one handle per
//! credential tuple even under concurrent first use.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_core::{Resource, ResourceSet};
//! use stratus_engine::{AdapterRegistry, Engine, EngineConfig};
//! use stratus_graph::{KindSchema, SchemaRegistry};
//!
//! let adapters = AdapterRegistry::new().register(Arc::new(NetworkAdapter::connect(creds)?));
//! let schemas = SchemaRegistry::new()
//!     .register(KindSchema::new("network").owner("project", "project"));
//!
//! let mut batch = ResourceSet::new();
//! batch.push(Resource::new("network", "n1").with_attr("project", "p1"))?;
//!
//! let engine = Engine::new(adapters, schemas, EngineConfig::default());
//! let report = engine.run(batch).await;
//! ```

pub mod adapter;
pub mod cache;
pub mod engine;
pub mod report;

pub use adapter::{AdapterRegistry, ResourceAdapter};
pub use cache::{Credentials, HandleCache, DEFAULT_HANDLE_TTL};
pub use engine::{Engine, EngineConfig};
pub use report::{AppliedChange, PassReport, ResourceReport};
