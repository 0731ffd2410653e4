//! Target dependency graph.

use std::collections::{BTreeSet, HashMap};

use kiln_common::TargetId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};

/// Edge weight: whether the dependency is re-exported to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Dependents of the depending target also see the dependency.
    pub exported: bool,
}

/// Directed graph of build targets.
///
/// Edges point from dependent to dependency: if `app` depends on `core`
/// there is an edge `app → core`.
#[derive(Debug, Default)]
pub struct TargetGraph {
    graph: DiGraph<TargetId, DependencyEdge>,
    nodes: HashMap<TargetId, NodeIndex>,
}

impl TargetGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target, returning its node. Adding an existing target is a no-op.
    pub fn add_target(&mut self, id: &TargetId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.nodes.insert(id.clone(), idx);
        idx
    }

    /// Records that `from` depends on `to`.
    pub fn add_dependency(&mut self, from: &TargetId, to: &TargetId, exported: bool) {
        let a = self.add_target(from);
        let b = self.add_target(to);
        self.graph.update_edge(a, b, DependencyEdge { exported });
    }

    /// Returns `true` if the target is part of the graph.
    pub fn contains(&self, id: &TargetId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the graph has no targets.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of `id` with their export flag, sorted by id.
    pub fn direct_dependencies(&self, id: &TargetId) -> Vec<(TargetId, DependencyEdge)> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Outgoing)
            .map(|e| (self.graph[e.target()].clone(), *e.weight()))
            .collect();
        deps.sort_by(|a, b| a.0.cmp(&b.0));
        deps
    }

    /// Targets that depend directly on `id`, sorted.
    pub fn dependents(&self, id: &TargetId) -> Vec<TargetId> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .neighbors_directed(idx, Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every target visible to `id` at compile time.
    ///
    /// All direct dependencies are included; beyond them, only exported
    /// edges are followed. `id` itself is never part of the result, even
    /// on a cycle.
    pub fn all_dependencies(&self, id: &TargetId) -> BTreeSet<TargetId> {
        let Some(&start) = self.nodes.get(id) else {
            return BTreeSet::new();
        };
        let mut seen: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut stack: Vec<NodeIndex> = self.graph.neighbors_directed(start, Outgoing).collect();

        while let Some(node) = stack.pop() {
            if node == start || !seen.insert(node) {
                continue;
            }
            stack.extend(
                self.graph
                    .edges_directed(node, Outgoing)
                    .filter(|e| e.weight().exported)
                    .map(|e| e.target()),
            );
        }

        seen.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    pub(crate) fn inner(&self) -> &DiGraph<TargetId, DependencyEdge> {
        &self.graph
    }
}
