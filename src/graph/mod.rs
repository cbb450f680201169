//! Relationship graph: overlap aggregation, the finalized adjacency store,
//! and flat per-node file persistence.

pub mod aggregate;
pub mod store;

pub use aggregate::{aggregate_parallel, AggregationOutput, AggregationStats, OverlapAccumulator};
pub use store::{load_graph, write_adjacency, write_entity_names, write_graph, GraphSummary};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::EntityId;

/// One retained edge, seen from the owning entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub entity_id: EntityId,
    /// Cumulative overlap, identical from both endpoints.
    pub minutes: f64,
    /// `minutes` as a percentage of the owning entity's tracked time.
    pub share: f64,
    /// Grouping periods (seasons) in which overlap occurred, sorted.
    pub periods: Vec<String>,
}

/// Adjacency of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinks {
    /// Number of retained edges. Diagnostic only.
    pub connectivity_score: usize,
    pub tracked_minutes: f64,
    /// Sorted by descending minutes, then ascending neighbor id.
    pub connections: Vec<Connection>,
}

/// Immutable weighted undirected graph keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipGraph {
    nodes: BTreeMap<EntityId, NodeLinks>,
}

/// Per-entity diagnostic row for summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityRow {
    pub entity_id: EntityId,
    pub connectivity_score: usize,
    pub total_minutes: f64,
}

impl RelationshipGraph {
    pub fn from_nodes(nodes: BTreeMap<EntityId, NodeLinks>) -> Self {
        Self { nodes }
    }

    /// Neighbors of `id` in stored order; unknown ids have none.
    pub fn neighbors(&self, id: EntityId) -> &[Connection] {
        self.nodes
            .get(&id)
            .map(|n| n.connections.as_slice())
            .unwrap_or(&[])
    }

    pub fn node(&self, id: EntityId) -> Option<&NodeLinks> {
        self.nodes.get(&id)
    }

    pub fn connection(&self, from: EntityId, to: EntityId) -> Option<&Connection> {
        self.neighbors(from).iter().find(|c| c.entity_id == to)
    }

    pub fn weight(&self, a: EntityId, b: EntityId) -> Option<f64> {
        self.connection(a, b).map(|c| c.minutes)
    }

    pub fn share(&self, from: EntityId, to: EntityId) -> Option<f64> {
        self.connection(from, to).map(|c| c.share)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> Vec<EntityId> {
        self.nodes.keys().copied().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&EntityId, &NodeLinks)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.connections.len()).sum::<usize>() / 2
    }

    /// The `n` most connected entities (ties by ascending id).
    pub fn top_connected(&self, n: usize) -> Vec<ConnectivityRow> {
        let mut rows: Vec<ConnectivityRow> = self
            .nodes
            .iter()
            .map(|(id, links)| ConnectivityRow {
                entity_id: *id,
                connectivity_score: links.connectivity_score,
                total_minutes: round2(links.connections.iter().map(|c| c.minutes).sum()),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.connectivity_score
                .cmp(&a.connectivity_score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        rows.truncate(n);
        rows
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
