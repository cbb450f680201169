use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{retained_lengths, score_lengths, ScoreBreakdown};
use crate::config::{ScoringConfig, TierConfig};
use crate::ingest::{EntityDirectory, EntityId};
use crate::search::PathEngine;

/// Why a sampled pair did not become a candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("pair joins an entity to itself")]
    SameEntity,

    #[error("entity {0} is not in the directory")]
    UnknownEntity(EntityId),

    #[error("entity {0} has no affiliation history")]
    MissingHistory(EntityId),

    #[error("entities share an affiliation")]
    CoAffiliated,

    #[error("no path over quality edges")]
    NoQualityPath,

    #[error("shortest path of length {0} is outside the tier")]
    OutsideTier(usize),

    #[error("only {found} solutions in the scoring window")]
    TooFewSolutions { found: usize },
}

impl Rejection {
    /// Stable label used when tallying rejections.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::SameEntity => "same_entity",
            Rejection::UnknownEntity(_) => "unknown_entity",
            Rejection::MissingHistory(_) => "missing_history",
            Rejection::CoAffiliated => "co_affiliated",
            Rejection::NoQualityPath => "no_quality_path",
            Rejection::OutsideTier(_) => "outside_tier",
            Rejection::TooFewSolutions { .. } => "too_few_solutions",
        }
    }
}

/// An eligible pair with its score and path statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub source: EntityId,
    pub target: EntityId,
    /// Shortest path length over every edge, in nodes.
    pub shortest_length: usize,
    /// Shortest path length over quality edges, in nodes.
    pub quality_length: usize,
    pub score: u32,
    pub breakdown: ScoreBreakdown,
    /// Retained path lengths, non-decreasing.
    pub path_lengths: Vec<usize>,
    /// Paths enumerated before the scoring window was applied.
    pub path_count: usize,
    pub truncated: bool,
}

/// Run every eligibility check for an ordered pair and score it.
pub fn evaluate_pair(
    engine: &PathEngine<'_>,
    directory: &EntityDirectory,
    source: EntityId,
    target: EntityId,
    tier: &TierConfig,
    scoring: &ScoringConfig,
) -> Result<CandidatePair, Rejection> {
    if source == target {
        return Err(Rejection::SameEntity);
    }
    let a = directory.get(source).ok_or(Rejection::UnknownEntity(source))?;
    let b = directory.get(target).ok_or(Rejection::UnknownEntity(target))?;
    if a.affiliations.is_empty() {
        return Err(Rejection::MissingHistory(source));
    }
    if b.affiliations.is_empty() {
        return Err(Rejection::MissingHistory(target));
    }
    if a.is_co_affiliated(b) {
        return Err(Rejection::CoAffiliated);
    }

    let quality = engine
        .shortest_quality(source, target)
        .ok_or(Rejection::NoQualityPath)?;
    if !tier.accepts(quality.len()) {
        return Err(Rejection::OutsideTier(quality.len()));
    }
    // The tier bounds the unfiltered shortest path as well; a quality path
    // implies an unfiltered one exists.
    let shortest_length = engine
        .shortest(source, target)
        .map_or(quality.len(), |p| p.len());
    if !tier.accepts(shortest_length) {
        return Err(Rejection::OutsideTier(shortest_length));
    }

    let set = engine.paths(source, target);
    let lengths = set.lengths();
    let retained = retained_lengths(&lengths, scoring);
    if retained.len() < scoring.min_solutions {
        return Err(Rejection::TooFewSolutions {
            found: retained.len(),
        });
    }

    let breakdown = score_lengths(&lengths, scoring);

    Ok(CandidatePair {
        source,
        target,
        shortest_length,
        quality_length: quality.len(),
        score: breakdown.total,
        breakdown,
        path_lengths: retained,
        path_count: set.len(),
        truncated: set.is_truncated(),
    })
}
