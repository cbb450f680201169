//! Bounded exhaustive enumeration of simple paths.
//!
//! Iterative deepening over target lengths; each length is a depth-first
//! walk driven by an explicit stack of neighbor cursors, so the path length
//! bound never turns into recursion depth.

use std::collections::HashSet;

use super::{Path, PathSet, SearchLimits};
use crate::graph::RelationshipGraph;
use crate::ingest::EntityId;

/// All simple paths from `source` to `target` with 2..=`max_length` nodes,
/// at most `per_length_cap` per length, ordered by increasing length.
///
/// `source == target` yields the one-node path at every bound.
pub fn enumerate_paths(
    graph: &RelationshipGraph,
    source: EntityId,
    target: EntityId,
    limits: &SearchLimits,
) -> PathSet {
    if source == target {
        return PathSet {
            paths: vec![Path::trivial(source)],
            truncated_lengths: Vec::new(),
        };
    }

    let mut set = PathSet::default();
    for length in 2..=limits.max_length {
        let level = paths_of_length(graph, source, target, length, limits.per_length_cap);
        if level.capped {
            set.truncated_lengths.push(length);
        }
        set.paths.extend(level.paths);
    }
    set
}

/// Paths collected for one length.
struct Level {
    paths: Vec<Path>,
    capped: bool,
}

impl Level {
    /// Record a path; returns true when a path arrives past the cap.
    fn accept(&mut self, path: Path, cap: usize) -> bool {
        if self.paths.len() >= cap {
            self.capped = true;
        } else {
            self.paths.push(path);
        }
        self.capped
    }
}

fn paths_of_length(
    graph: &RelationshipGraph,
    source: EntityId,
    target: EntityId,
    length: usize,
    cap: usize,
) -> Level {
    let mut level = Level {
        paths: Vec::new(),
        capped: false,
    };
    // nodes[i] is the node whose neighbors cursors[i] walks through.
    let mut nodes = vec![source];
    let mut shares: Vec<f64> = Vec::new();
    let mut on_path: HashSet<EntityId> = HashSet::from([source]);
    let mut cursors: Vec<usize> = vec![0];

    while let (Some(&current), Some(&cursor)) = (nodes.last(), cursors.last()) {
        let Some(conn) = graph.neighbors(current).get(cursor) else {
            cursors.pop();
            nodes.pop();
            on_path.remove(&current);
            shares.pop();
            continue;
        };
        let top = cursors.len() - 1;
        cursors[top] += 1;
        let next = conn.entity_id;

        if nodes.len() == length - 1 {
            // Final hop: only the target completes the path.
            if next == target {
                let mut path_nodes = nodes.clone();
                path_nodes.push(target);
                let mut path_shares = shares.clone();
                path_shares.push(conn.share);
                let full = level.accept(
                    Path {
                        nodes: path_nodes,
                        shares: path_shares,
                    },
                    cap,
                );
                if full {
                    break;
                }
            }
            continue;
        }

        if next == target || on_path.contains(&next) {
            continue;
        }
        nodes.push(next);
        shares.push(conn.share);
        on_path.insert(next);
        cursors.push(0);
    }

    level
}
