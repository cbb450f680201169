//! BFS shortest path with an optional share threshold.

use std::collections::{HashMap, HashSet, VecDeque};

use super::Path;
use crate::graph::RelationshipGraph;
use crate::ingest::EntityId;

/// Shortest path from `source` to `target`, or `None` when unreachable.
///
/// With `min_share`, an edge is only traversable when its share from the
/// traversing node's side is at least that value. The target is accepted the
/// first time it is discovered, and neighbors are visited in stored order,
/// so ties resolve the same way on every run.
pub fn shortest_path(
    graph: &RelationshipGraph,
    source: EntityId,
    target: EntityId,
    min_share: Option<f64>,
) -> Option<Path> {
    if source == target {
        return Some(Path::trivial(source));
    }

    let mut parents: HashMap<EntityId, (EntityId, f64)> = HashMap::new();
    let mut visited: HashSet<EntityId> = HashSet::from([source]);
    let mut queue = VecDeque::from([source]);

    while let Some(current) = queue.pop_front() {
        for conn in graph.neighbors(current) {
            if min_share.is_some_and(|min| conn.share < min) {
                continue;
            }
            let next = conn.entity_id;
            if !visited.insert(next) {
                continue;
            }
            parents.insert(next, (current, conn.share));
            if next == target {
                return Some(rebuild(&parents, source, target));
            }
            queue.push_back(next);
        }
    }

    None
}

fn rebuild(parents: &HashMap<EntityId, (EntityId, f64)>, source: EntityId, target: EntityId) -> Path {
    let mut nodes = vec![target];
    let mut shares = Vec::new();
    let mut current = target;
    while current != source {
        let Some(&(parent, share)) = parents.get(&current) else {
            break;
        };
        nodes.push(parent);
        shares.push(share);
        current = parent;
    }
    nodes.reverse();
    shares.reverse();
    Path { nodes, shares }
}
