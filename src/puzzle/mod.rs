//! Scheduling selected pairs into dated puzzle slots and writing them out.

use chrono::NaiveDate;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::ingest::EntityId;
use crate::scoring::{CandidatePair, Selection};

const PUZZLES_DIR: &str = "puzzles";
const INDEX_FILE: &str = "puzzle_index.json";

/// One puzzle: a pair to connect, for one slot and difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub source: EntityId,
    pub target: EntityId,
    pub slot: String,
    /// Shortest path length in nodes, over every edge.
    pub path_length: usize,
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub source: EntityId,
    pub target: EntityId,
    pub path_length: usize,
}

/// `slot -> difficulty -> entry`, as written to `puzzle_index.json`.
pub type PuzzleIndex = BTreeMap<String, BTreeMap<String, IndexEntry>>;

/// `days` consecutive `YYYY-MM-DD` labels starting at `start`.
pub fn daily_slots(start: NaiveDate, days: usize) -> Vec<String> {
    start
        .iter_days()
        .take(days)
        .map(|day| day.format("%Y-%m-%d").to_string())
        .collect()
}

/// Fill slots with one pair per tier.
///
/// Pairs already taken by an earlier tier are dropped, then every tier's
/// list is shuffled once and slot `i` takes pair `i` of each tier. Only as
/// many slots are filled as the shortest tier list allows. Records come out
/// slot by slot, tiers in selection order.
pub fn assemble<R: Rng>(selections: &[Selection], slots: &[String], rng: &mut R) -> Vec<PuzzleRecord> {
    let mut used: HashSet<(EntityId, EntityId)> = HashSet::new();
    let mut tiers: Vec<(&str, Vec<&CandidatePair>)> = Vec::with_capacity(selections.len());

    for selection in selections {
        let mut pairs: Vec<&CandidatePair> = selection
            .pairs
            .iter()
            .filter(|p| used.insert(unordered(p.source, p.target)))
            .collect();
        let dropped = selection.pairs.len() - pairs.len();
        if dropped > 0 {
            log::debug!("Tier {}: dropped {} pairs used by another tier", selection.tier, dropped);
        }
        pairs.shuffle(rng);
        tiers.push((selection.tier.as_str(), pairs));
    }

    let filled = tiers
        .iter()
        .map(|(_, pairs)| pairs.len())
        .min()
        .unwrap_or(0)
        .min(slots.len());
    if filled < slots.len() {
        log::warn!("Only {} of {} slots can be filled", filled, slots.len());
    }

    let mut records = Vec::with_capacity(filled * tiers.len());
    for (i, slot) in slots.iter().take(filled).enumerate() {
        for (tier, pairs) in &tiers {
            let pair = pairs[i];
            records.push(PuzzleRecord {
                source: pair.source,
                target: pair.target,
                slot: slot.clone(),
                path_length: pair.shortest_length,
                difficulty: tier.to_string(),
            });
        }
    }
    records
}

fn unordered(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    (a.min(b), a.max(b))
}

pub fn build_index(records: &[PuzzleRecord]) -> PuzzleIndex {
    let mut index = PuzzleIndex::new();
    for record in records {
        index.entry(record.slot.clone()).or_default().insert(
            record.difficulty.clone(),
            IndexEntry {
                source: record.source,
                target: record.target,
                path_length: record.path_length,
            },
        );
    }
    index
}

/// Write `puzzles/<slot>-<difficulty>.json` for every record and
/// `puzzle_index.json` under `dir`. Returns the number of puzzle files.
pub fn write_puzzles(records: &[PuzzleRecord], dir: &Path) -> Result<usize> {
    let puzzles_dir = dir.join(PUZZLES_DIR);
    fs::create_dir_all(&puzzles_dir)?;

    for record in records {
        let path = puzzles_dir.join(format!("{}-{}.json", record.slot, record.difficulty));
        fs::write(path, serde_json::to_string(record)?)?;
    }

    let index = build_index(records);
    fs::write(dir.join(INDEX_FILE), serde_json::to_string_pretty(&index)?)?;

    log::info!(
        "Wrote {} puzzles across {} slots to {}",
        records.len(),
        index.len(),
        dir.display()
    );
    Ok(records.len())
}

#[derive(Debug, Serialize)]
struct ValidPair<'a> {
    tier: &'a str,
    #[serde(flatten)]
    pair: &'a CandidatePair,
}

/// Export every selected pair, tagged with its tier, as a JSON array.
pub fn write_valid_pairs(selections: &[Selection], path: &Path) -> Result<usize> {
    let rows: Vec<ValidPair> = selections
        .iter()
        .flat_map(|s| s.pairs.iter().map(|pair| ValidPair { tier: &s.tier, pair }))
        .collect();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&rows)?)?;
    Ok(rows.len())
}
