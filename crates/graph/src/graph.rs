//! Dependency graph and deterministic execution order.

use std::collections::HashMap;

use itertools::Itertools;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use stratus_core::{Error, ResourceId, ResourceSet};

/// The `requires` relation of one batch, materialized for scheduling.
///
/// Edges point from requirement to dependent: an edge `b -> a` means `a`
/// requires `b` and may only start once `b` is terminal.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceId, ()>,
    nodes: HashMap<ResourceId, NodeIndex>,
    declaration: HashMap<ResourceId, usize>,
}

impl DependencyGraph {
    /// Build the graph from a batch.
    ///
    /// Every `requires` target must be declared in the same batch; edges to
    /// unknown targets are dropped and reported as configuration errors
    /// attributed to the declaring resource. A resource requiring itself is
    /// reported as a cycle.
    pub fn from_set(set: &ResourceSet) -> (Self, Vec<Error>) {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut declaration = HashMap::new();
        let mut errors = Vec::new();

        for (position, resource) in set.iter().enumerate() {
            let index = graph.add_node(resource.id.clone());
            nodes.insert(resource.id.clone(), index);
            declaration.insert(resource.id.clone(), position);
        }

        for resource in set.iter() {
            let Some(&to) = nodes.get(&resource.id) else {
                continue;
            };
            for requirement in &resource.requires {
                if *requirement == resource.id {
                    errors.push(Error::dependency_cycle(resource.id.clone()));
                    continue;
                }
                match nodes.get(requirement) {
                    Some(&from) => {
                        graph.add_edge(from, to, ());
                    }
                    None => errors.push(Error::unknown_requirement(
                        resource.id.clone(),
                        requirement.clone(),
                    )),
                }
            }
        }

        (
            Self {
                graph,
                nodes,
                declaration,
            },
            errors,
        )
    }

    /// Cycle detection over strongly connected components.
    ///
    /// Consistent declared ordering never produces cycles; this is a
    /// defensive invariant. Every member of a non-trivial component gets
    /// its own error so dependents are short-circuited per resource.
    pub fn cycle_errors(&self) -> Vec<Error> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .filter_map(|index| self.graph.node_weight(index))
            .sorted_by_key(|id| self.declaration.get(id).copied().unwrap_or(usize::MAX))
            .map(|id| Error::dependency_cycle(id.clone()))
            .collect()
    }

    /// A topological order consistent with `requires`, ties broken by
    /// declaration order so runs are deterministic.
    ///
    /// Fails with a cycle error when no complete order exists; resources
    /// caught in a cycle are named by [`Self::cycle_errors`].
    pub fn execution_order(&self) -> Result<Vec<ResourceId>, Error> {
        let mut indegree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                (
                    index,
                    self.graph
                        .neighbors_directed(index, Direction::Incoming)
                        .count(),
                )
            })
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        loop {
            let ready = indegree
                .iter()
                .filter(|(_, &count)| count == 0)
                .map(|(&index, _)| index)
                .min_by_key(|index| {
                    self.graph
                        .node_weight(*index)
                        .and_then(|id| self.declaration.get(id).copied())
                        .unwrap_or(usize::MAX)
                });
            let Some(next) = ready else {
                break;
            };
            indegree.remove(&next);
            for dependent in self.graph.neighbors_directed(next, Direction::Outgoing) {
                if let Some(count) = indegree.get_mut(&dependent) {
                    *count = count.saturating_sub(1);
                }
            }
            if let Some(id) = self.graph.node_weight(next) {
                order.push(id.clone());
            }
        }

        match indegree.keys().next() {
            None => Ok(order),
            Some(&blocked) => {
                let id = self
                    .graph
                    .node_weight(blocked)
                    .cloned()
                    .unwrap_or_else(|| ResourceId::new("", ""));
                Err(Error::dependency_cycle(id))
            }
        }
    }

    /// Direct requirements of `id`, i.e. resources it must wait for.
    pub fn requirements(&self, id: &ResourceId) -> Vec<ResourceId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependents of `id`, i.e. resources waiting for it.
    pub fn dependents(&self, id: &ResourceId) -> Vec<ResourceId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &ResourceId, direction: Direction) -> Vec<ResourceId> {
        let Some(&index) = self.nodes.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, direction)
            .filter_map(|neighbor| self.graph.node_weight(neighbor).cloned())
            .sorted_by_key(|id| self.declaration.get(id).copied().unwrap_or(usize::MAX))
            .collect()
    }

    /// Number of resources in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of `requires` edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
