//! End-to-end stages shared by the binaries.

use rand::Rng;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::graph::{aggregate_parallel, write_adjacency, write_entity_names, write_graph, AggregationOutput};
use crate::ingest::{discover_context_files, load_batch, load_entities, EntityDirectory};
use crate::puzzle::{assemble, daily_slots, write_puzzles, write_valid_pairs};
use crate::scoring::{PairSelector, Selection};
use crate::search::PathEngine;

/// Load entities and every context file, then aggregate and finalize the graph.
///
/// Files that fail to load are logged and left out.
pub fn build_graph(config: &Config) -> Result<(EntityDirectory, AggregationOutput)> {
    let start = Instant::now();
    let directory = load_entities(&config.data.entities_dir, &config.aggregation);

    let files = discover_context_files(&config.data.shift_charts_dir);
    log::info!(
        "Found {} context files under {}",
        files.len(),
        config.data.shift_charts_dir.display()
    );

    let accumulator = aggregate_parallel(
        files.par_iter().filter_map(|file| match load_batch(file) {
            Ok(batch) => Some(batch),
            Err(e) => {
                log::warn!("Skipping context file: {}", e);
                None
            }
        }),
        &directory,
        &config.aggregation,
    );

    let stats = accumulator.stats().clone();
    log::info!(
        "Aggregated {} batches, {} records ({} skipped), {} overlapping pairs",
        stats.batches,
        stats.records,
        stats.skipped_records,
        stats.overlapping_pairs
    );
    log::info!(
        "Excluded pairs: unknown role {}, incompatible role {}, co-affiliated {}",
        stats.excluded_unknown_role,
        stats.excluded_incompatible_role,
        stats.excluded_co_affiliated
    );

    let output = accumulator.finalize(config.aggregation.min_overlap_minutes);
    log::info!(
        "Graph has {} entities and {} connections ({:.2?})",
        output.graph.len(),
        output.graph.edge_count(),
        start.elapsed()
    );
    Ok((directory, output))
}

/// Persist the graph and its presentation snapshot.
pub fn write_graph_outputs(config: &Config, directory: &EntityDirectory, output: &AggregationOutput) -> Result<()> {
    write_graph(output, &config.data.linkages_dir)?;
    let web = config.data.output_dir.join("web_data");
    write_adjacency(&output.graph, &web.join("connections.json"))?;
    let named = write_entity_names(directory, &web.join("players.json"))?;
    log::info!("Wrote web snapshot with {} named entities to {}", named, web.display());
    Ok(())
}

/// Select ranked pairs for every configured tier.
pub fn select_pairs<R: Rng>(
    config: &Config,
    engine: &PathEngine<'_>,
    directory: &EntityDirectory,
    rng: &mut R,
) -> Result<Vec<Selection>> {
    let selector = PairSelector::new(engine, directory, &config.scoring, &config.selection);
    let selections = selector.select_all(rng)?;
    log::info!("Path cache holds {} pairs", engine.cached());
    Ok(selections)
}

/// Schedule the selections into daily slots and write every puzzle file.
pub fn write_schedule<R: Rng>(
    config: &Config,
    selections: &[Selection],
    out_dir: &Path,
    rng: &mut R,
) -> Result<usize> {
    let start = config
        .puzzles
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let slots = daily_slots(start, config.puzzles.days);
    let records = assemble(selections, &slots, rng);
    write_valid_pairs(selections, &out_dir.join("valid_pairs.json"))?;
    write_puzzles(&records, out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::load_graph;
    use crate::scoring::rng_from_seed;
    use std::fs;
    use tempfile::TempDir;

    /// Six forwards on three teams, linked in two triangles over two games.
    fn write_fixture(root: &Path) {
        let players = root.join("players");
        fs::create_dir_all(&players).unwrap();
        let teams = [(1, "TOR"), (2, "TOR"), (3, "MTL"), (4, "MTL"), (5, "BOS"), (6, "BOS")];
        for (id, team) in teams {
            let body = format!(
                r#"{{"playerId": {id}, "position": "C",
                    "firstName": {{"default": "First{id}"}}, "lastName": {{"default": "Last{id}"}},
                    "seasonTotals": [{{"season": 20232024, "teamName": {{"default": "{team}"}}}}]}}"#
            );
            fs::write(players.join(format!("{id}.json")), body).unwrap();
        }

        // Each (a, b, team) line shares a team id for two full periods.
        let season = root.join("shift_charts").join("20242025");
        fs::create_dir_all(&season).unwrap();
        let games: [(u64, [(u64, u64, u64); 3]); 2] = [
            (2024020001, [(1, 3, 100), (3, 5, 200), (5, 1, 300)]),
            (2024020002, [(2, 4, 100), (4, 6, 200), (6, 2, 300)]),
        ];
        for (game, lines) in games {
            let mut shifts = Vec::new();
            for (a, b, team) in lines {
                for id in [a, b] {
                    shifts.push(format!(
                        r#"{{"playerId": {id}, "teamId": {team}, "period": 1, "startTime": "00:00", "endTime": "20:00", "gameId": {game}}}"#
                    ));
                    shifts.push(format!(
                        r#"{{"playerId": {id}, "teamId": {team}, "period": 2, "startTime": "00:00", "endTime": "20:00", "gameId": {game}}}"#
                    ));
                }
            }
            fs::write(
                season.join(format!("{game}.json")),
                format!(r#"{{"data": [{}]}}"#, shifts.join(",")),
            )
            .unwrap();
        }
    }

    fn fixture_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.data.entities_dir = root.join("players");
        config.data.shift_charts_dir = root.join("shift_charts");
        config.data.linkages_dir = root.join("player_linkages");
        config.data.output_dir = root.join("docs");
        config.aggregation.min_overlap_minutes = 30.0;
        config
    }

    #[test]
    fn test_build_and_persist_graph() {
        let temp = TempDir::new().unwrap();
        write_fixture(temp.path());
        let config = fixture_config(temp.path());

        let (directory, output) = build_graph(&config).unwrap();
        assert_eq!(directory.len(), 6);
        assert_eq!(output.stats.batches, 2);
        // Two triangles of 40-minute overlaps
        assert_eq!(output.graph.len(), 6);
        assert_eq!(output.graph.edge_count(), 6);

        write_graph_outputs(&config, &directory, &output).unwrap();
        let reloaded = load_graph(&config.data.linkages_dir).unwrap();
        assert_eq!(reloaded, output.graph);
        assert!(config.data.output_dir.join("web_data/connections.json").exists());
        assert!(config.data.output_dir.join("web_data/players.json").exists());
    }

    #[test]
    fn test_missing_inputs_build_empty_graph() {
        let temp = TempDir::new().unwrap();
        let config = fixture_config(temp.path());
        let (directory, output) = build_graph(&config).unwrap();
        assert!(directory.is_empty());
        assert!(output.graph.is_empty());
    }

    #[test]
    fn test_schedule_is_written() {
        let temp = TempDir::new().unwrap();
        write_fixture(temp.path());
        let mut config = fixture_config(temp.path());
        config.selection.tiers.truncate(1);
        config.selection.pairs_per_tier = 2;
        config.selection.max_attempts = 100;
        config.puzzles.days = 3;
        config.puzzles.start_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 1);

        let (directory, output) = build_graph(&config).unwrap();
        let engine = PathEngine::new(&output.graph, &config.search);
        let mut rng = rng_from_seed(Some(17));
        let selections = select_pairs(&config, &engine, &directory, &mut rng).unwrap();
        assert!(!selections[0].pairs.is_empty());

        let out = config.data.output_dir.clone();
        let written = write_schedule(&config, &selections, &out, &mut rng).unwrap();
        assert!(written >= 1);
        assert!(out.join("valid_pairs.json").exists());
        assert!(out.join("puzzle_index.json").exists());
        assert!(out.join("puzzles/2025-03-01-easy.json").exists());
    }
}
