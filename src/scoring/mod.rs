//! Pair scoring, per-path uniqueness, and candidate selection.

mod eligibility;
mod selection;

pub use eligibility::{evaluate_pair, CandidatePair, Rejection};
pub use selection::{rng_from_seed, PairSelector, Selection, SelectionStatus};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::ingest::EntityId;
use crate::search::PathSet;

/// Components of a pair score. `total` is their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub solution_count: u32,
    pub range_bonus: u32,
    pub variety_bonus: u32,
    pub volume_bonus: u32,
    pub total: u32,
}

/// Lengths inside the configured scoring window, in input order.
pub fn retained_lengths(lengths: &[usize], config: &ScoringConfig) -> Vec<usize> {
    lengths
        .iter()
        .copied()
        .filter(|l| (config.min_path_length..=config.max_path_length).contains(l))
        .collect()
}

/// Score a pair from the lengths of its enumerated paths.
///
/// Only lengths inside the scoring window count; with none left the score
/// is zero. Adding a path can never lower any component.
pub fn score_lengths(lengths: &[usize], config: &ScoringConfig) -> ScoreBreakdown {
    let retained = retained_lengths(lengths, config);
    let (Some(&min), Some(&max)) = (retained.iter().min(), retained.iter().max()) else {
        return ScoreBreakdown::default();
    };

    let count = retained.len();
    let distinct: BTreeSet<usize> = retained.iter().copied().collect();

    let solution_count = config.solution_weight * count as u32;
    let range_bonus = (max - min) as u32;
    let variety_bonus = config.variety_weight * distinct.len() as u32;
    let volume_bonus = config
        .volume_steps
        .iter()
        .filter(|step| count >= step.min_paths)
        .map(|step| step.bonus)
        .max()
        .unwrap_or(0);

    ScoreBreakdown {
        solution_count,
        range_bonus,
        variety_bonus,
        volume_bonus,
        total: solution_count + range_bonus + variety_bonus + volume_bonus,
    }
}

/// Obscurity of a single path from its edge shares, 0 (obscure) to 100.
///
/// The mean share is clamped to `[floor, 100]`, shifted by `floor`, divided
/// by `span` and clamped to `[0, 100]`, then rounded to one decimal.
/// A path without edges has no score.
pub fn uniqueness_score(shares: &[f64], config: &ScoringConfig) -> Option<f64> {
    if shares.is_empty() {
        return None;
    }
    let floor = config.uniqueness_floor;
    let mean = shares.iter().sum::<f64>() / shares.len() as f64;
    let clamped = mean.clamp(floor, 100.0);
    let scaled = ((clamped - floor) / config.uniqueness_span * 100.0).clamp(0.0, 100.0);
    Some((scaled * 10.0).round() / 10.0)
}

/// One player-facing solution of a puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub nodes: Vec<EntityId>,
    pub shares: Vec<f64>,
    pub length: usize,
    pub uniqueness: Option<f64>,
}

/// Turn an enumerated path set into solutions, keeping its length order.
pub fn solutions(set: &PathSet, config: &ScoringConfig) -> Vec<Solution> {
    set.paths
        .iter()
        .map(|path| Solution {
            nodes: path.nodes.clone(),
            shares: path.shares.clone(),
            length: path.len(),
            uniqueness: uniqueness_score(&path.shares, config),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Path;
    use proptest::prelude::*;

    #[test]
    fn test_score_example_pair() {
        // 12 retained paths at lengths {3, 4, 5}
        let mut lengths = vec![3; 6];
        lengths.extend(vec![4; 4]);
        lengths.extend(vec![5; 2]);
        let score = score_lengths(&lengths, &ScoringConfig::default());
        assert_eq!(score.solution_count, 24);
        assert_eq!(score.range_bonus, 2);
        assert_eq!(score.variety_bonus, 9);
        assert_eq!(score.volume_bonus, 5);
        assert_eq!(score.total, 40);
    }

    #[test]
    fn test_volume_steps() {
        let config = ScoringConfig::default();
        assert_eq!(score_lengths(&[3; 9], &config).volume_bonus, 0);
        assert_eq!(score_lengths(&[3; 10], &config).volume_bonus, 5);
        assert_eq!(score_lengths(&[3; 15], &config).volume_bonus, 7);
        assert_eq!(score_lengths(&[3; 20], &config).volume_bonus, 10);
        assert_eq!(score_lengths(&[3; 200], &config).volume_bonus, 10);
    }

    #[test]
    fn test_window_filters_lengths() {
        let config = ScoringConfig::default();
        assert_eq!(score_lengths(&[], &config), ScoreBreakdown::default());
        assert_eq!(score_lengths(&[1, 9, 10], &config).total, 0);
        let score = score_lengths(&[1, 3, 9], &config);
        assert_eq!(score.solution_count, 2);
        assert_eq!(score.range_bonus, 0);
        assert_eq!(retained_lengths(&[1, 2, 8, 9], &config), vec![2, 8]);
    }

    #[test]
    fn test_uniqueness_example() {
        let config = ScoringConfig::default();
        assert_eq!(uniqueness_score(&[4.0, 100.0], &config), Some(50.5));
    }

    #[test]
    fn test_uniqueness_bounds() {
        let config = ScoringConfig::default();
        assert_eq!(uniqueness_score(&[], &config), None);
        assert_eq!(uniqueness_score(&[1.0, 2.0], &config), Some(0.0));
        assert_eq!(uniqueness_score(&[4.0], &config), Some(0.0));
        assert_eq!(uniqueness_score(&[100.0, 100.0], &config), Some(100.0));
        assert_eq!(uniqueness_score(&[23.0], &config), Some(20.0));
    }

    #[test]
    fn test_solutions_keep_order() {
        let set = PathSet {
            paths: vec![
                Path {
                    nodes: vec![EntityId(1), EntityId(2)],
                    shares: vec![30.0],
                },
                Path {
                    nodes: vec![EntityId(1), EntityId(3), EntityId(2)],
                    shares: vec![4.0, 100.0],
                },
            ],
            truncated_lengths: vec![],
        };
        let solutions = solutions(&set, &ScoringConfig::default());
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[0].length, 2);
        assert_eq!(solutions[1].length, 3);
        assert_eq!(solutions[1].uniqueness, Some(50.5));
    }

    proptest! {
        #[test]
        fn adding_a_path_never_lowers_the_score(
            lengths in prop::collection::vec(1usize..11, 0..40),
            extra in 1usize..11,
        ) {
            let config = ScoringConfig::default();
            let before = score_lengths(&lengths, &config).total;
            let mut more = lengths.clone();
            more.push(extra);
            let after = score_lengths(&more, &config).total;
            prop_assert!(after >= before);
            if (config.min_path_length..=config.max_path_length).contains(&extra) {
                prop_assert!(after > before);
            }
        }

        #[test]
        fn uniqueness_stays_in_range(shares in prop::collection::vec(0.0f64..=100.0, 1..10)) {
            let score = uniqueness_score(&shares, &ScoringConfig::default()).unwrap();
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
