//! Chunks: groups of mutually dependent targets built together.

use std::collections::HashMap;

use kiln_common::TargetId;
use petgraph::algo::tarjan_scc;

use crate::graph::TargetGraph;

/// A maximal set of mutually dependent targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildChunk {
    targets: Vec<TargetId>,
}

impl BuildChunk {
    /// Creates a chunk. Members are sorted; the first is the representative.
    ///
    /// Returns `None` if `targets` is empty.
    pub fn new(mut targets: Vec<TargetId>) -> Option<Self> {
        if targets.is_empty() {
            return None;
        }
        targets.sort();
        targets.dedup();
        Some(Self { targets })
    }

    /// Members in sorted order.
    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// The target asked about chunk-wide decisions: incremental mode,
    /// argument snapshot location, cancellation.
    pub fn representative(&self) -> &TargetId {
        &self.targets[0]
    }

    /// Returns `true` for a chunk formed by a circular dependency.
    pub fn is_circular(&self) -> bool {
        self.targets.len() > 1
    }

    /// Returns `true` if `id` is a member.
    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.binary_search(id).is_ok()
    }
}

/// Splits a [`TargetGraph`] into chunks and orders them so that every
/// chunk comes after the chunks it depends on.
#[derive(Debug, Default)]
pub struct ChunkCoordinator {
    chunks: Vec<BuildChunk>,
    index: HashMap<TargetId, usize>,
}

impl ChunkCoordinator {
    /// Computes the strongly connected components of `graph`.
    pub fn new(graph: &TargetGraph) -> Self {
        // Edges run dependent → dependency, so tarjan's reverse topological
        // order already yields dependencies first.
        let chunks: Vec<BuildChunk> = tarjan_scc(graph.inner())
            .into_iter()
            .filter_map(|scc| {
                BuildChunk::new(scc.into_iter().map(|n| graph.inner()[n].clone()).collect())
            })
            .collect();

        let mut index = HashMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            for id in chunk.targets() {
                index.insert(id.clone(), i);
            }
            if chunk.is_circular() {
                tracing::debug!(representative = %chunk.representative(), size = chunk.targets().len(), "circular chunk");
            }
        }

        Self { chunks, index }
    }

    /// Chunks in build order.
    pub fn chunks(&self) -> &[BuildChunk] {
        &self.chunks
    }

    /// The chunk containing `id`.
    pub fn chunk_of(&self, id: &TargetId) -> Option<&BuildChunk> {
        self.index.get(id).map(|&i| &self.chunks[i])
    }

    /// The representative of the chunk containing `id`.
    pub fn representative(&self, id: &TargetId) -> Option<&TargetId> {
        self.chunk_of(id).map(BuildChunk::representative)
    }
}
