//! Flat per-node persistence of the relationship graph.
//!
//! Layout: one `<entity id>.json` file per node holding its `NodeLinks`, plus
//! a `summary.json` with diagnostics. This is the only persistence the
//! pipeline has.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::aggregate::AggregationOutput;
use super::{ConnectivityRow, NodeLinks, RelationshipGraph};
use crate::error::{LinkError, Result};
use crate::ingest::{EntityDirectory, EntityId};
use walkdir::WalkDir;

const SUMMARY_FILE: &str = "summary.json";

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_entities: usize,
    pub total_connections: usize,
    pub contexts_processed: usize,
    pub records_skipped: usize,
    pub periods_processed: Vec<String>,
    pub generated_at: String,
    pub top_connected: Vec<ConnectivityRow>,
}

impl GraphSummary {
    pub fn from_output(output: &AggregationOutput, top_n: usize) -> Self {
        Self {
            total_entities: output.graph.len(),
            total_connections: output.graph.edge_count(),
            contexts_processed: output.stats.batches,
            records_skipped: output.stats.skipped_records,
            periods_processed: output.periods.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            top_connected: output.graph.top_connected(top_n),
        }
    }
}

/// Write one file per node plus `summary.json` into `dir` (created if missing).
/// Returns the number of node files written.
pub fn write_graph(output: &AggregationOutput, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)?;

    let mut written = 0;
    for (id, links) in output.graph.nodes() {
        let path = dir.join(format!("{}.json", id));
        fs::write(&path, serde_json::to_string_pretty(links)?)?;
        written += 1;
    }

    let summary = GraphSummary::from_output(output, 20);
    fs::write(dir.join(SUMMARY_FILE), serde_json::to_string_pretty(&summary)?)?;

    log::info!(
        "Wrote {} node files and {} to {}",
        written,
        SUMMARY_FILE,
        dir.display()
    );
    Ok(written)
}

/// Read a graph back from per-node files. `summary.json` and malformed
/// files are skipped; a missing directory is an error.
pub fn load_graph(dir: &Path) -> Result<RelationshipGraph> {
    if !dir.is_dir() {
        return Err(LinkError::InvalidInput(format!(
            "linkage directory not found: {}",
            dir.display()
        )));
    }

    let mut nodes = BTreeMap::new();
    let mut skipped = 0usize;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_node_file = path.extension().and_then(|s| s.to_str()) == Some("json")
            && path.file_name().and_then(|s| s.to_str()) != Some(SUMMARY_FILE);
        if !is_node_file {
            continue;
        }

        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            skipped += 1;
            log::warn!("Skipping linkage file with non-numeric name: {}", path.display());
            continue;
        };

        let parsed = fs::read_to_string(path)
            .map_err(LinkError::from)
            .and_then(|content| serde_json::from_str::<NodeLinks>(&content).map_err(LinkError::from));
        match parsed {
            Ok(links) => {
                nodes.insert(EntityId(id), links);
            }
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping linkage file {}: {}", path.display(), e);
            }
        }
    }

    let graph = RelationshipGraph::from_nodes(nodes);
    log::info!(
        "Loaded {} entities with linkages ({} files skipped), {} connections",
        graph.len(),
        skipped,
        graph.edge_count()
    );
    Ok(graph)
}

/// Write the presentation snapshot `{ "<id>": [neighbor ids] }`.
pub fn write_adjacency(graph: &RelationshipGraph, path: &Path) -> Result<()> {
    let adjacency: BTreeMap<EntityId, Vec<EntityId>> = graph
        .nodes()
        .map(|(id, links)| (*id, links.connections.iter().map(|c| c.entity_id).collect()))
        .collect();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(&adjacency)?)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct NamedEntity<'a> {
    id: EntityId,
    name: &'a str,
}

/// Write `[{ "id", "name" }]` for every entity with a display name.
pub fn write_entity_names(directory: &EntityDirectory, path: &Path) -> Result<usize> {
    let named: Vec<NamedEntity> = directory
        .iter()
        .filter_map(|e| e.name.as_deref().map(|name| NamedEntity { id: e.id, name }))
        .collect();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(&named)?)?;
    Ok(named.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OverlapAccumulator;
    use crate::ingest::Entity;
    use tempfile::TempDir;

    fn sample_output() -> AggregationOutput {
        let mut acc = OverlapAccumulator::new();
        acc.record_overlap(EntityId(1), EntityId(2), 700 * 60, "20232024");
        acc.record_overlap(EntityId(2), EntityId(3), 650 * 60, "20222023");
        acc.record_tracked(EntityId(1), 1400 * 60);
        acc.record_tracked(EntityId(2), 2000 * 60);
        acc.record_tracked(EntityId(3), 1300 * 60);
        acc.finalize(600.0)
    }

    #[test]
    fn test_write_and_load_graph() {
        let temp_dir = TempDir::new().unwrap();
        let output = sample_output();
        let written = write_graph(&output, temp_dir.path()).unwrap();
        assert_eq!(written, 3);
        assert!(temp_dir.path().join("summary.json").exists());

        let loaded = load_graph(temp_dir.path()).unwrap();
        assert_eq!(loaded, output.graph);
    }

    #[test]
    fn test_summary_contents() {
        let temp_dir = TempDir::new().unwrap();
        write_graph(&sample_output(), temp_dir.path()).unwrap();
        let summary: GraphSummary = serde_json::from_str(
            &fs::read_to_string(temp_dir.path().join("summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary.total_entities, 3);
        assert_eq!(summary.total_connections, 2);
        assert_eq!(summary.top_connected[0].entity_id, EntityId(2));
        assert_eq!(summary.top_connected[0].connectivity_score, 2);
    }

    #[test]
    fn test_load_skips_malformed_files() {
        let temp_dir = TempDir::new().unwrap();
        write_graph(&sample_output(), temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("99.json"), "{bad").unwrap();
        fs::write(temp_dir.path().join("readme.json"), "{}").unwrap();
        let loaded = load_graph(temp_dir.path()).unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_load_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_graph(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_write_adjacency_and_names() {
        let temp_dir = TempDir::new().unwrap();
        let output = sample_output();
        let adjacency_path = temp_dir.path().join("web/connections.json");
        write_adjacency(&output.graph, &adjacency_path).unwrap();
        let adjacency: BTreeMap<String, Vec<u64>> =
            serde_json::from_str(&fs::read_to_string(&adjacency_path).unwrap()).unwrap();
        assert_eq!(adjacency["2"], vec![1, 3]);

        let mut named = Entity::new(EntityId(1), Some("F"));
        named.name = Some("Connor McDavid".to_string());
        let directory: EntityDirectory =
            vec![named, Entity::new(EntityId(2), Some("F"))].into_iter().collect();
        let names_path = temp_dir.path().join("web/players.json");
        assert_eq!(write_entity_names(&directory, &names_path).unwrap(), 1);
        let content = fs::read_to_string(&names_path).unwrap();
        assert!(content.contains("Connor McDavid"));
    }
}
