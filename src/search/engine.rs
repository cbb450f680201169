use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::{enumerate_paths, shortest_path, Path, PathSet, SearchLimits};
use crate::config::SearchConfig;
use crate::graph::RelationshipGraph;
use crate::ingest::EntityId;

/// Search front-end over one immutable graph.
///
/// Enumerated path sets are kept in a bounded LRU keyed by the ordered
/// (source, target) pair, so scoring a pair and later exporting its
/// solutions enumerates only once. Safe to share across rayon workers.
pub struct PathEngine<'g> {
    graph: &'g RelationshipGraph,
    limits: SearchLimits,
    min_share: f64,
    cache: Mutex<LruCache<(EntityId, EntityId), Arc<PathSet>>>,
}

impl<'g> PathEngine<'g> {
    pub fn new(graph: &'g RelationshipGraph, config: &SearchConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            graph,
            limits: SearchLimits::from(config),
            min_share: config.min_edge_share,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn graph(&self) -> &'g RelationshipGraph {
        self.graph
    }

    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    /// Shortest path over every edge.
    pub fn shortest(&self, source: EntityId, target: EntityId) -> Option<Path> {
        shortest_path(self.graph, source, target, None)
    }

    /// Shortest path over edges whose share meets the configured minimum.
    pub fn shortest_quality(&self, source: EntityId, target: EntityId) -> Option<Path> {
        shortest_path(self.graph, source, target, Some(self.min_share))
    }

    /// Enumerated paths for the pair, from cache when available.
    pub fn paths(&self, source: EntityId, target: EntityId) -> Arc<PathSet> {
        let key = (source, target);
        if let Some(hit) = self.lock_cache().get(&key) {
            return Arc::clone(hit);
        }

        // Enumerate without holding the lock; racing workers may both compute.
        let set = Arc::new(enumerate_paths(self.graph, source, target, &self.limits));
        if set.is_truncated() {
            log::debug!(
                "Enumeration {} -> {} hit the per-length cap at lengths {:?}",
                source,
                target,
                set.truncated_lengths
            );
        }
        self.lock_cache().put(key, Arc::clone(&set));
        set
    }

    /// Number of cached pairs.
    pub fn cached(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LruCache<(EntityId, EntityId), Arc<PathSet>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
