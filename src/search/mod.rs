//! Path search over the finalized relationship graph.
//!
//! Two queries share the same read-only graph: a BFS shortest path with an
//! optional edge-quality filter, and a bounded exhaustive enumeration of
//! simple paths by increasing length.

mod engine;
mod enumerate;
mod shortest;

pub use engine::PathEngine;
pub use enumerate::enumerate_paths;
pub use shortest::shortest_path;

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::graph::RelationshipGraph;
use crate::ingest::EntityId;

/// A simple path. `shares[i]` is the share of the edge `nodes[i] -> nodes[i + 1]`
/// as seen from `nodes[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<EntityId>,
    pub shares: Vec<f64>,
}

impl Path {
    /// The one-node path used when source and target coincide.
    pub fn trivial(id: EntityId) -> Self {
        Self {
            nodes: vec![id],
            shares: Vec::new(),
        }
    }

    /// Length in nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn source(&self) -> Option<EntityId> {
        self.nodes.first().copied()
    }

    pub fn target(&self) -> Option<EntityId> {
        self.nodes.last().copied()
    }

    /// Every consecutive pair is an edge of `graph` and no node repeats.
    pub fn is_valid_in(&self, graph: &RelationshipGraph) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.nodes.iter().all(|n| seen.insert(*n))
            && self.shares.len() + 1 == self.nodes.len()
            && self
                .nodes
                .windows(2)
                .all(|w| graph.connection(w[0], w[1]).is_some())
    }
}

/// Hard caps on exhaustive enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Longest path length (nodes) enumerated.
    pub max_length: usize,
    /// Paths collected per length before that length is cut off.
    pub per_length_cap: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_length: 8,
            per_length_cap: 200,
        }
    }
}

impl From<&SearchConfig> for SearchLimits {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_length: config.max_path_length,
            per_length_cap: config.max_paths_per_length,
        }
    }
}

/// Result of an exhaustive enumeration, ordered by increasing length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSet {
    pub paths: Vec<Path>,
    /// Lengths where a path beyond the cap was found and dropped.
    pub truncated_lengths: Vec<usize>,
}

impl PathSet {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        !self.truncated_lengths.is_empty()
    }

    /// Path lengths in result order (non-decreasing).
    pub fn lengths(&self) -> Vec<usize> {
        self.paths.iter().map(Path::len).collect()
    }

    pub fn shortest_len(&self) -> Option<usize> {
        self.paths.first().map(Path::len)
    }
}
