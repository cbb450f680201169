use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::records::{parse_entity, parse_shift_chart};
use super::{ContextBatch, EntityDirectory};
use crate::config::AggregationConfig;
use crate::error::{LinkError, Result};

/// A discovered per-game file: `<root>/<period_label>/<context>.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub period_label: String,
    /// Game id parsed from the file stem, when numeric.
    pub context_hint: Option<u64>,
    pub path: PathBuf,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Discover shift chart files one directory level below `root`.
///
/// The directory name becomes the period label of every file inside it.
/// Results are sorted by (period, path) so aggregation order is stable.
/// A missing root is logged and yields no files.
pub fn discover_context_files(root: &Path) -> Vec<ContextFile> {
    if !root.is_dir() {
        log::warn!("Shift chart directory not found: {}", root.display());
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_json(path) {
            continue;
        }

        let period_label = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let context_hint = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok());

        files.push(ContextFile {
            period_label,
            context_hint,
            path: path.to_path_buf(),
        });
    }

    files.sort_by(|a, b| {
        a.period_label
            .cmp(&b.period_label)
            .then_with(|| a.path.cmp(&b.path))
    });
    log::info!("Discovered {} context files in {}", files.len(), root.display());
    files
}

/// Discover per-entity JSON files directly inside `root`, sorted by path.
pub fn discover_entity_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        log::warn!("Entity directory not found: {}", root.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_json(p))
        .collect();
    files.sort();
    files
}

/// Read and parse one context file.
pub fn load_batch(file: &ContextFile) -> Result<ContextBatch> {
    let content = std::fs::read_to_string(&file.path).map_err(LinkError::Io)?;
    parse_shift_chart(&content, file.context_hint, &file.period_label)
        .map_err(|e| LinkError::Parse(format!("{}: {}", file.path.display(), e)))
}

/// Load every entity file under `root`. Unreadable or malformed files are
/// skipped with a warning.
pub fn load_entities(root: &Path, policy: &AggregationConfig) -> EntityDirectory {
    let files = discover_entity_files(root);
    log::info!("Loading {} entity files from {}", files.len(), root.display());

    let mut directory = EntityDirectory::new();
    let mut errors = 0usize;
    for path in &files {
        let parsed = std::fs::read_to_string(path)
            .map_err(LinkError::Io)
            .and_then(|content| parse_entity(&content, policy));
        match parsed {
            Ok(entity) => directory.insert(entity),
            Err(e) => {
                errors += 1;
                log::warn!("Skipping entity file {}: {}", path.display(), e);
            }
        }
    }

    let mut role_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entity in directory.iter() {
        *role_counts
            .entry(entity.category.as_deref().unwrap_or("?"))
            .or_default() += 1;
    }
    log::info!(
        "Loaded {} entities ({} skipped), roles: {:?}",
        directory.len(),
        errors,
        role_counts
    );

    directory
}
