use rand::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

use super::{evaluate_pair, CandidatePair, Rejection};
use crate::config::{ScoringConfig, SelectionConfig, TierConfig};
use crate::error::{LinkError, Result};
use crate::ingest::{EntityDirectory, EntityId};
use crate::search::PathEngine;

/// Seeded generator when a seed is configured, OS entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    /// The candidate target was reached.
    Complete,
    /// Attempts ran out first; the ranking covers what was found.
    BudgetExhausted,
}

/// Ranked pairs for one tier.
#[derive(Debug, Clone)]
pub struct Selection {
    pub tier: String,
    /// Best-first, at most `pairs_per_tier`.
    pub pairs: Vec<CandidatePair>,
    pub attempts: usize,
    pub candidates: usize,
    pub status: SelectionStatus,
    pub rejections: BTreeMap<&'static str, usize>,
}

/// Samples random pairs, keeps the eligible ones and ranks them by score.
pub struct PairSelector<'a> {
    engine: &'a PathEngine<'a>,
    directory: &'a EntityDirectory,
    scoring: &'a ScoringConfig,
    selection: &'a SelectionConfig,
}

impl<'a> PairSelector<'a> {
    pub fn new(
        engine: &'a PathEngine<'a>,
        directory: &'a EntityDirectory,
        scoring: &'a ScoringConfig,
        selection: &'a SelectionConfig,
    ) -> Self {
        Self {
            engine,
            directory,
            scoring,
            selection,
        }
    }

    /// Run every configured tier with the same generator, in config order.
    pub fn select_all<R: Rng>(&self, rng: &mut R) -> Result<Vec<Selection>> {
        self.selection
            .tiers
            .iter()
            .map(|tier| self.select(tier, rng))
            .collect()
    }

    /// Draw pairs in batches until enough candidates are found or the
    /// attempt budget is spent.
    ///
    /// Draws happen on the caller's generator and each batch is evaluated
    /// in parallel with results kept in draw order, so a fixed seed gives
    /// a fixed selection.
    pub fn select<R: Rng>(&self, tier: &TierConfig, rng: &mut R) -> Result<Selection> {
        let universe = self.engine.graph().node_ids();
        if universe.len() < 2 {
            return Err(LinkError::SelectionFailed {
                tier: tier.name.clone(),
                attempts: 0,
            });
        }

        let target = self.selection.target_candidates();
        let budget = self.selection.max_attempts;
        let mut seen: HashSet<(EntityId, EntityId)> = HashSet::new();
        let mut candidates: Vec<CandidatePair> = Vec::new();
        let mut rejections: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut attempts = 0;

        while candidates.len() < target && attempts < budget {
            let draw = self.selection.batch_size.min(budget - attempts);
            attempts += draw;
            let batch: Vec<(EntityId, EntityId)> = (0..draw)
                .map(|_| draw_pair(&universe, rng))
                .filter(|&(a, b)| seen.insert((a.min(b), a.max(b))))
                .collect();

            let results: Vec<std::result::Result<CandidatePair, Rejection>> = batch
                .par_iter()
                .map(|&(a, b)| evaluate_pair(self.engine, self.directory, a, b, tier, self.scoring))
                .collect();

            for result in results {
                match result {
                    Ok(pair) if candidates.len() < target => candidates.push(pair),
                    Ok(_) => {}
                    Err(rejection) => *rejections.entry(rejection.label()).or_default() += 1,
                }
            }
            log::debug!(
                "Tier {}: {} candidates after {} attempts",
                tier.name,
                candidates.len(),
                attempts
            );
        }

        if candidates.is_empty() {
            log::warn!("Tier {}: no eligible pair, rejections {:?}", tier.name, rejections);
            return Err(LinkError::SelectionFailed {
                tier: tier.name.clone(),
                attempts,
            });
        }

        let status = if candidates.len() >= target {
            SelectionStatus::Complete
        } else {
            SelectionStatus::BudgetExhausted
        };
        let found = candidates.len();

        candidates.sort_by(|x, y| {
            y.score
                .cmp(&x.score)
                .then_with(|| x.source.cmp(&y.source))
                .then_with(|| x.target.cmp(&y.target))
        });
        candidates.truncate(self.selection.pairs_per_tier);

        log::info!(
            "Tier {}: kept {} of {} candidates ({} attempts, {:?})",
            tier.name,
            candidates.len(),
            found,
            attempts,
            status
        );

        Ok(Selection {
            tier: tier.name.clone(),
            pairs: candidates,
            attempts,
            candidates: found,
            status,
            rejections,
        })
    }
}

/// Two distinct nodes, uniformly.
fn draw_pair<R: Rng>(universe: &[EntityId], rng: &mut R) -> (EntityId, EntityId) {
    let i = rng.gen_range(0..universe.len());
    let mut j = rng.gen_range(0..universe.len() - 1);
    if j >= i {
        j += 1;
    }
    (universe[i], universe[j])
}
