//! Interval overlap aggregation.
//!
//! Context batches are reduced into an `OverlapAccumulator` keyed by the
//! unordered entity pair, so an edge's weight is the same from both ends by
//! construction. Accumulators merge by plain addition of whole seconds, which
//! keeps parallel aggregation exactly equal to the sequential result.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{round2, Connection, NodeLinks, RelationshipGraph};
use crate::config::AggregationConfig;
use crate::ingest::{ContextBatch, EntityDirectory, EntityId, IntervalRecord};

/// Running total for one unordered pair.
#[derive(Debug, Clone, Default, PartialEq)]
struct EdgeTally {
    seconds: u64,
    periods: BTreeSet<String>,
}

/// Counters reported after aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub batches: usize,
    pub records: usize,
    pub skipped_records: usize,
    pub partitions: usize,
    pub pairs_examined: usize,
    pub overlapping_pairs: usize,
    pub excluded_unknown_role: usize,
    pub excluded_incompatible_role: usize,
    pub excluded_co_affiliated: usize,
}

impl AggregationStats {
    fn merge(&mut self, other: &AggregationStats) {
        self.batches += other.batches;
        self.records += other.records;
        self.skipped_records += other.skipped_records;
        self.partitions += other.partitions;
        self.pairs_examined += other.pairs_examined;
        self.overlapping_pairs += other.overlapping_pairs;
        self.excluded_unknown_role += other.excluded_unknown_role;
        self.excluded_incompatible_role += other.excluded_incompatible_role;
        self.excluded_co_affiliated += other.excluded_co_affiliated;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairDecision {
    Linkable,
    UnknownRole,
    IncompatibleRole,
    CoAffiliated,
}

fn classify_pair(
    directory: &EntityDirectory,
    policy: &AggregationConfig,
    a: EntityId,
    b: EntityId,
) -> PairDecision {
    let (Some(role_a), Some(role_b)) = (directory.category(a), directory.category(b)) else {
        return PairDecision::UnknownRole;
    };
    if !policy.roles_compatible(role_a, role_b) {
        return PairDecision::IncompatibleRole;
    }
    if policy.exclude_co_affiliated && directory.co_affiliated(a, b) {
        return PairDecision::CoAffiliated;
    }
    PairDecision::Linkable
}

fn pair_key(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Additive overlap state. Build one per worker and `merge` them.
#[derive(Debug, Clone, Default)]
pub struct OverlapAccumulator {
    edges: HashMap<(EntityId, EntityId), EdgeTally>,
    tracked_seconds: HashMap<EntityId, u64>,
    periods: BTreeSet<String>,
    stats: AggregationStats,
}

/// Finalized graph plus what went into it.
#[derive(Debug, Clone)]
pub struct AggregationOutput {
    pub graph: RelationshipGraph,
    pub stats: AggregationStats,
    /// Every period label seen, sorted.
    pub periods: Vec<String>,
}

impl OverlapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `seconds` of overlap between `a` and `b` observed during `period`.
    pub fn record_overlap(&mut self, a: EntityId, b: EntityId, seconds: u64, period: &str) {
        if a == b || seconds == 0 {
            return;
        }
        let tally = self.edges.entry(pair_key(a, b)).or_default();
        tally.seconds += seconds;
        if !tally.periods.contains(period) {
            tally.periods.insert(period.to_string());
        }
    }

    /// Add `seconds` to an entity's total tracked time.
    pub fn record_tracked(&mut self, entity: EntityId, seconds: u64) {
        *self.tracked_seconds.entry(entity).or_default() += seconds;
    }

    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Fold one context batch into the accumulator.
    ///
    /// Records are partitioned by (sub-context, partition key); every unordered
    /// pair of intervals inside a partition is examined once.
    pub fn ingest(
        &mut self,
        batch: &ContextBatch,
        directory: &EntityDirectory,
        policy: &AggregationConfig,
    ) {
        self.stats.batches += 1;
        self.stats.records += batch.records.len();
        self.stats.skipped_records += batch.skipped;
        self.periods.insert(batch.period_label.clone());

        let mut partitions: BTreeMap<(u32, u64), Vec<&IntervalRecord>> = BTreeMap::new();
        for record in &batch.records {
            self.record_tracked(record.entity_id, u64::from(record.duration_secs()));
            partitions
                .entry((record.sub_context, record.partition_key))
                .or_default()
                .push(record);
        }

        for intervals in partitions.values() {
            self.stats.partitions += 1;
            for (i, first) in intervals.iter().enumerate() {
                for second in &intervals[i + 1..] {
                    if first.entity_id == second.entity_id {
                        continue;
                    }
                    self.stats.pairs_examined += 1;

                    let overlap = first.overlap_secs(second);
                    if overlap == 0 {
                        continue;
                    }
                    self.stats.overlapping_pairs += 1;

                    match classify_pair(directory, policy, first.entity_id, second.entity_id) {
                        PairDecision::Linkable => self.record_overlap(
                            first.entity_id,
                            second.entity_id,
                            u64::from(overlap),
                            &batch.period_label,
                        ),
                        PairDecision::UnknownRole => self.stats.excluded_unknown_role += 1,
                        PairDecision::IncompatibleRole => {
                            self.stats.excluded_incompatible_role += 1
                        }
                        PairDecision::CoAffiliated => self.stats.excluded_co_affiliated += 1,
                    }
                }
            }
        }
    }

    /// Combine two accumulators. Commutative and associative.
    pub fn merge(&mut self, other: OverlapAccumulator) {
        for (key, tally) in other.edges {
            let entry = self.edges.entry(key).or_default();
            entry.seconds += tally.seconds;
            entry.periods.extend(tally.periods);
        }
        for (entity, seconds) in other.tracked_seconds {
            *self.tracked_seconds.entry(entity).or_default() += seconds;
        }
        self.periods.extend(other.periods);
        self.stats.merge(&other.stats);
    }

    /// Apply the minimum-minutes threshold and build the immutable graph.
    pub fn finalize(self, min_overlap_minutes: f64) -> AggregationOutput {
        let tracked_minutes = |id: EntityId| {
            self.tracked_seconds.get(&id).copied().unwrap_or(0) as f64 / 60.0
        };
        let share_of = |minutes: f64, tracked: f64| {
            if tracked > 0.0 {
                round2((100.0 * minutes / tracked).min(100.0))
            } else {
                0.0
            }
        };

        let mut adjacency: BTreeMap<EntityId, Vec<Connection>> = BTreeMap::new();
        for ((a, b), tally) in &self.edges {
            let minutes = tally.seconds as f64 / 60.0;
            if minutes < min_overlap_minutes {
                continue;
            }
            let periods: Vec<String> = tally.periods.iter().cloned().collect();
            for (owner, other) in [(*a, *b), (*b, *a)] {
                adjacency.entry(owner).or_default().push(Connection {
                    entity_id: other,
                    minutes: round2(minutes),
                    share: share_of(minutes, tracked_minutes(owner)),
                    periods: periods.clone(),
                });
            }
        }

        let nodes = adjacency
            .into_iter()
            .map(|(id, mut connections)| {
                connections.sort_by(|x, y| {
                    y.minutes
                        .total_cmp(&x.minutes)
                        .then_with(|| x.entity_id.cmp(&y.entity_id))
                });
                let links = NodeLinks {
                    connectivity_score: connections.len(),
                    tracked_minutes: round2(tracked_minutes(id)),
                    connections,
                };
                (id, links)
            })
            .collect();

        AggregationOutput {
            graph: RelationshipGraph::from_nodes(nodes),
            stats: self.stats,
            periods: self.periods.into_iter().collect(),
        }
    }
}

/// Aggregate batches on the rayon pool: each worker folds into its own
/// accumulator, then the accumulators are merged pairwise.
pub fn aggregate_parallel<I>(
    batches: I,
    directory: &EntityDirectory,
    policy: &AggregationConfig,
) -> OverlapAccumulator
where
    I: ParallelIterator<Item = ContextBatch>,
{
    batches
        .fold(OverlapAccumulator::default, |mut acc, batch| {
            acc.ingest(&batch, directory, policy);
            acc
        })
        .reduce(OverlapAccumulator::default, |mut left, right| {
            left.merge(right);
            left
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Entity;
    use proptest::prelude::*;

    fn shift(entity: u64, team: u64, period: u32, start: u32, end: u32) -> IntervalRecord {
        IntervalRecord {
            entity_id: EntityId(entity),
            context_id: 1,
            sub_context: period,
            partition_key: team,
            start,
            end,
        }
    }

    fn batch(label: &str, records: Vec<IntervalRecord>) -> ContextBatch {
        ContextBatch {
            context_id: 1,
            period_label: label.to_string(),
            records,
            skipped: 0,
        }
    }

    fn forwards(ids: &[u64]) -> EntityDirectory {
        ids.iter()
            .map(|&id| Entity::new(EntityId(id), Some("F")))
            .collect()
    }

    #[test]
    fn test_overlap_accumulates_both_directions() {
        let directory = forwards(&[1, 2]);
        let policy = AggregationConfig::default();
        let mut acc = OverlapAccumulator::new();
        // 40 s overlap per game, 20 games -> 800 s
        for _ in 0..20 {
            acc.ingest(
                &batch("20232024", vec![shift(1, 7, 1, 0, 60), shift(2, 7, 1, 20, 80)]),
                &directory,
                &policy,
            );
        }
        let out = acc.finalize(0.0);
        let w = 800.0 / 60.0;
        assert!((out.graph.weight(EntityId(1), EntityId(2)).unwrap() - round2(w)).abs() < 1e-9);
        assert_eq!(
            out.graph.weight(EntityId(1), EntityId(2)),
            out.graph.weight(EntityId(2), EntityId(1))
        );
        assert_eq!(out.stats.batches, 20);
        assert_eq!(out.periods, vec!["20232024".to_string()]);
    }

    #[test]
    fn test_only_same_partition_interacts() {
        let directory = forwards(&[1, 2, 3]);
        let policy = AggregationConfig::default();
        let mut acc = OverlapAccumulator::new();
        acc.ingest(
            &batch(
                "s",
                vec![
                    shift(1, 7, 1, 0, 600),
                    shift(2, 8, 1, 0, 600), // other team
                    shift(3, 7, 2, 0, 600), // other period
                ],
            ),
            &directory,
            &policy,
        );
        let out = acc.finalize(0.0);
        assert!(out.graph.is_empty());
        assert_eq!(out.stats.partitions, 3);
        assert_eq!(out.stats.pairs_examined, 0);
    }

    #[test]
    fn test_role_filters() {
        let directory: EntityDirectory = vec![
            Entity::new(EntityId(1), Some("F")),
            Entity::new(EntityId(2), Some("D")),
            Entity::new(EntityId(3), Some("G")),
            Entity::new(EntityId(4), Some("G")),
            Entity::new(EntityId(5), None),
        ]
        .into_iter()
        .collect();
        let policy = AggregationConfig::default();
        let mut acc = OverlapAccumulator::new();
        acc.ingest(
            &batch(
                "s",
                vec![
                    shift(1, 7, 1, 0, 600),
                    shift(2, 7, 1, 0, 600),
                    shift(3, 7, 1, 0, 600),
                    shift(4, 7, 1, 0, 600),
                    shift(5, 7, 1, 0, 600),
                    shift(6, 7, 1, 0, 600), // not in directory
                ],
            ),
            &directory,
            &policy,
        );
        let stats = acc.stats().clone();
        let out = acc.finalize(0.0);
        assert!(out.graph.is_empty());
        assert_eq!(stats.pairs_examined, 15);
        assert_eq!(stats.excluded_unknown_role, 9);
        assert_eq!(stats.excluded_incompatible_role, 6);
    }

    #[test]
    fn test_co_affiliated_entities_never_linked() {
        let directory: EntityDirectory = vec![
            Entity::new(EntityId(1), Some("F")).with_affiliation("20232024", "Oilers"),
            Entity::new(EntityId(2), Some("F")).with_affiliation("20232024", "Oilers"),
            Entity::new(EntityId(3), Some("F")).with_affiliation("20222023", "Oilers"),
        ]
        .into_iter()
        .collect();
        let policy = AggregationConfig::default();
        let mut acc = OverlapAccumulator::new();
        acc.ingest(
            &batch(
                "20232024",
                vec![
                    shift(1, 7, 1, 0, 40_000),
                    shift(2, 7, 1, 0, 40_000),
                    shift(3, 7, 1, 0, 40_000),
                ],
            ),
            &directory,
            &policy,
        );
        let out = acc.finalize(600.0);
        assert!(out.graph.connection(EntityId(1), EntityId(2)).is_none());
        assert!(out.graph.connection(EntityId(1), EntityId(3)).is_some());
        assert!(out.graph.connection(EntityId(2), EntityId(3)).is_some());
        assert_eq!(out.stats.excluded_co_affiliated, 1);
    }

    #[test]
    fn test_co_affiliation_filter_can_be_disabled() {
        let directory: EntityDirectory = vec![
            Entity::new(EntityId(1), Some("F")).with_affiliation("s", "T"),
            Entity::new(EntityId(2), Some("F")).with_affiliation("s", "T"),
        ]
        .into_iter()
        .collect();
        let policy = AggregationConfig {
            exclude_co_affiliated: false,
            ..AggregationConfig::default()
        };
        let mut acc = OverlapAccumulator::new();
        acc.ingest(
            &batch("s", vec![shift(1, 7, 1, 0, 60), shift(2, 7, 1, 0, 60)]),
            &directory,
            &policy,
        );
        assert_eq!(acc.finalize(0.0).graph.edge_count(), 1);
    }

    #[test]
    fn test_threshold_scenario() {
        // A-B 60 min, B-C 30 min, B-D 650 min with a 600 minute threshold
        let mut acc = OverlapAccumulator::new();
        acc.record_overlap(EntityId(1), EntityId(2), 60 * 60, "s");
        acc.record_overlap(EntityId(2), EntityId(3), 30 * 60, "s");
        acc.record_overlap(EntityId(2), EntityId(4), 650 * 60, "s");
        let out = acc.finalize(600.0);
        assert_eq!(out.graph.edge_count(), 1);
        assert!(out.graph.connection(EntityId(2), EntityId(4)).is_some());
        assert!(!out.graph.contains(EntityId(3)));

        let mut acc = OverlapAccumulator::new();
        acc.record_overlap(EntityId(1), EntityId(2), 600 * 60, "s");
        assert_eq!(acc.finalize(600.0).graph.edge_count(), 1, "threshold is inclusive");
    }

    #[test]
    fn test_periods_deduplicated_and_sorted() {
        let mut acc = OverlapAccumulator::new();
        acc.record_overlap(EntityId(1), EntityId(2), 60, "20232024");
        acc.record_overlap(EntityId(2), EntityId(1), 60, "20222023");
        acc.record_overlap(EntityId(1), EntityId(2), 60, "20232024");
        let out = acc.finalize(0.0);
        let conn = out.graph.connection(EntityId(1), EntityId(2)).unwrap();
        assert_eq!(conn.periods, vec!["20222023".to_string(), "20232024".to_string()]);
        assert_eq!(conn.minutes, 3.0);
    }

    #[test]
    fn test_share_relative_to_tracked_time() {
        let mut acc = OverlapAccumulator::new();
        acc.record_overlap(EntityId(1), EntityId(2), 600, "s");
        acc.record_tracked(EntityId(1), 1200);
        acc.record_tracked(EntityId(2), 600);
        let out = acc.finalize(0.0);
        assert_eq!(out.graph.share(EntityId(1), EntityId(2)), Some(50.0));
        assert_eq!(out.graph.share(EntityId(2), EntityId(1)), Some(100.0));
        assert_eq!(out.graph.node(EntityId(1)).unwrap().tracked_minutes, 20.0);
        assert_eq!(out.graph.node(EntityId(1)).unwrap().connectivity_score, 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let directory = forwards(&[1, 2, 3, 4]);
        let policy = AggregationConfig::default();
        let batches: Vec<ContextBatch> = (0..12u32)
            .map(|g| {
                batch(
                    if g % 2 == 0 { "a" } else { "b" },
                    vec![
                        shift(1, 7, 1, 0, 45 + g),
                        shift(2, 7, 1, 10, 70),
                        shift(3, 7, 1, 30 + g, 90),
                        shift(4, 7, 2, 0, 90),
                    ],
                )
            })
            .collect();

        let mut sequential = OverlapAccumulator::new();
        for b in &batches {
            sequential.ingest(b, &directory, &policy);
        }
        let sequential = sequential.finalize(0.0);
        let parallel = aggregate_parallel(batches.into_par_iter(), &directory, &policy).finalize(0.0);

        assert_eq!(sequential.graph, parallel.graph);
        assert_eq!(sequential.stats, parallel.stats);
        assert_eq!(sequential.periods, parallel.periods);
    }

    proptest! {
        #[test]
        fn edge_weights_are_symmetric(
            shifts in prop::collection::vec((1u64..8, 0u32..3, 0u32..300, 1u32..120), 0..40)
        ) {
            let directory = forwards(&[1, 2, 3, 4, 5, 6, 7]);
            let policy = AggregationConfig::default();
            let records = shifts
                .iter()
                .map(|&(id, period, start, len)| shift(id, 1, period, start, start + len))
                .collect();
            let mut acc = OverlapAccumulator::new();
            acc.ingest(&batch("s", records), &directory, &policy);
            let graph = acc.finalize(0.0).graph;
            for (id, links) in graph.nodes() {
                for conn in &links.connections {
                    prop_assert_eq!(graph.weight(conn.entity_id, *id), Some(conn.minutes));
                    prop_assert!(conn.share >= 0.0 && conn.share <= 100.0);
                }
            }
        }

        #[test]
        fn co_affiliated_pairs_never_share_an_edge(
            teams in prop::collection::vec(0u8..3, 6),
            shifts in prop::collection::vec((0usize..6, 0u32..200, 1u32..200), 0..40)
        ) {
            let directory: EntityDirectory = teams
                .iter()
                .enumerate()
                .map(|(i, team)| {
                    Entity::new(EntityId(i as u64), Some("F"))
                        .with_affiliation("20232024", &format!("team-{}", team))
                })
                .collect();
            let policy = AggregationConfig::default();
            let records = shifts
                .iter()
                .map(|&(i, start, len)| shift(i as u64, 1, 1, start, start + len))
                .collect();
            let mut acc = OverlapAccumulator::new();
            acc.ingest(&batch("20232024", records), &directory, &policy);
            let graph = acc.finalize(0.0).graph;
            for (id, links) in graph.nodes() {
                for conn in &links.connections {
                    prop_assert!(!directory.co_affiliated(*id, conn.entity_id));
                }
            }
        }
    }
}
