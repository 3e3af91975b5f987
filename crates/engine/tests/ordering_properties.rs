//! Property-based tests for dependency-ordered execution using proptest.
//!
//! Properties verified:
//! - Requirements reach a terminal state strictly before dependents start
//! - A full pass over a random DAG converges every resource
//! - A second pass over the same DAG applies nothing

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;

use proptest::prelude::*;

use stratus_core::{Resource, ResourceId, ResourceSet};
use stratus_engine::{AdapterRegistry, Engine, EngineConfig};
use stratus_graph::SchemaRegistry;

use support::{CloudAdapter, FakeCloud};

fn node_name(i: usize) -> String {
    format!("node-{i}")
}

/// Bit index of the candidate edge (dependent `i` requires `j`), `j < i`.
/// Edges only ever point at lower indices, so every generated graph is a DAG.
fn edge_bit(i: usize, j: usize) -> usize {
    i * (i - 1) / 2 + j
}

/// Build the batch encoded by the edge bitmap: `node-i` requires `node-j`
/// whenever the bit for `(i, j)` is set.
fn build_batch(n: usize, edge_bits: &[bool]) -> (ResourceSet, Vec<(usize, usize)>) {
    let mut set = ResourceSet::new();
    let mut edges = Vec::new();
    for i in 0..n {
        let mut resource = Resource::new("node", node_name(i));
        for j in 0..i {
            if edge_bits.get(edge_bit(i, j)).copied().unwrap_or(false) {
                resource = resource.with_requirement(ResourceId::new("node", node_name(j)));
                edges.push((i, j));
            }
        }
        if set.push(resource).is_err() {
            panic!("duplicate node in generated batch");
        }
    }
    (set, edges)
}

fn node_engine(cloud: &Arc<FakeCloud>) -> Engine {
    let adapters =
        AdapterRegistry::new().register(Arc::new(CloudAdapter::new("node", cloud.clone())));
    Engine::new(adapters, SchemaRegistry::new(), EngineConfig::default())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: for every edge "A requires B", B's last adapter call lands
    /// in the log strictly before A's first adapter call, whatever order
    /// the worker pool interleaves independent resources in.
    #[test]
    fn prop_requirements_terminal_before_dependent_starts(
        n in 2..8usize,
        edge_bits in proptest::collection::vec(any::<bool>(), 28),
    ) {
        let cloud = FakeCloud::new_arc();
        let engine = node_engine(&cloud);
        let (set, edges) = build_batch(n, &edge_bits);

        let rt = tokio::runtime::Runtime::new().expect("runtime creation should succeed");
        let report = rt.block_on(engine.run(set));
        prop_assert_eq!(report.converged, n);

        let log = cloud.log();
        for (dependent, requirement) in edges {
            let started = log
                .iter()
                .position(|entry| entry == &format!("read:node[{}]", node_name(dependent)));
            let terminal = log
                .iter()
                .position(|entry| entry == &format!("create:node[{}]", node_name(requirement)));
            prop_assert!(
                matches!((terminal, started), (Some(t), Some(s)) if t < s),
                "node-{} started before its requirement node-{} was terminal: {:?}",
                dependent,
                requirement,
                log
            );
        }
    }

    /// Property: a converged DAG stays converged; the second pass computes
    /// an empty changeset for every resource and never calls apply.
    #[test]
    fn prop_second_pass_over_random_dag_applies_nothing(
        n in 1..8usize,
        edge_bits in proptest::collection::vec(any::<bool>(), 28),
    ) {
        let cloud = FakeCloud::new_arc();
        let engine = node_engine(&cloud);

        let rt = tokio::runtime::Runtime::new().expect("runtime creation should succeed");
        let (first_batch, _) = build_batch(n, &edge_bits);
        let first = rt.block_on(engine.run(first_batch));
        prop_assert_eq!(first.converged, n);
        prop_assert_eq!(cloud.count("apply:"), n);

        let (second_batch, _) = build_batch(n, &edge_bits);
        let second = rt.block_on(engine.run(second_batch));
        prop_assert_eq!(second.converged, n);
        prop_assert_eq!(cloud.count("apply:"), n);
    }
}
