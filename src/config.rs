use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub puzzles: PuzzleConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the per-season shift chart folders (`<season>/<game>.json`).
    pub shift_charts_dir: PathBuf,
    /// Folder of per-player attribute files (`<id>.json`).
    pub entities_dir: PathBuf,
    /// Folder the per-node linkage files are written to and read from.
    pub linkages_dir: PathBuf,
    /// Folder receiving puzzles, the puzzle index and the web snapshot.
    pub output_dir: PathBuf,
    pub log_level: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            shift_charts_dir: PathBuf::from("shift_charts"),
            entities_dir: PathBuf::from("players"),
            linkages_dir: PathBuf::from("player_linkages"),
            output_dir: PathBuf::from("docs"),
            log_level: "info".to_string(),
        }
    }
}

/// Overlap aggregation policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Edges below this many accumulated minutes are dropped at finalization.
    pub min_overlap_minutes: f64,
    /// Never link two entities that share a (period, group) affiliation.
    pub exclude_co_affiliated: bool,
    /// Roles that are never linked to anyone (after alias normalization).
    pub isolated_roles: Vec<String>,
    /// Raw role -> normalized role. Unlisted roles are kept as-is.
    pub role_aliases: BTreeMap<String, String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        let role_aliases = [("C", "F"), ("L", "F"), ("R", "F")]
            .into_iter()
            .map(|(raw, normalized)| (raw.to_string(), normalized.to_string()))
            .collect();
        Self {
            min_overlap_minutes: 600.0,
            exclude_co_affiliated: true,
            isolated_roles: vec!["G".to_string()],
            role_aliases,
        }
    }
}

impl AggregationConfig {
    /// Normalize a raw role through the alias table.
    pub fn normalize_role(&self, raw: &str) -> String {
        let raw = raw.trim();
        self.role_aliases
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    /// Two normalized roles can be linked when neither is isolating and they match.
    pub fn roles_compatible(&self, a: &str, b: &str) -> bool {
        if self.isolated_roles.iter().any(|r| r == a || r == b) {
            return false;
        }
        a == b
    }
}

/// Path search limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Longest path (in nodes) produced by exhaustive enumeration.
    pub max_path_length: usize,
    /// Enumeration stops collecting a length once this many paths were found.
    pub max_paths_per_length: usize,
    /// Minimum share (percent) for an edge to count in quality-filtered searches.
    pub min_edge_share: f64,
    /// Number of enumerated pairs kept in memory.
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_path_length: 8,
            max_paths_per_length: 200,
            min_edge_share: 4.0,
            cache_capacity: 256,
        }
    }
}

/// One step of the volume bonus: `bonus` when at least `min_paths` paths are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VolumeStep {
    pub min_paths: usize,
    pub bonus: u32,
}

/// Pair scoring constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Shortest path length (nodes) counted as a solution.
    pub min_path_length: usize,
    /// Longest path length (nodes) counted as a solution.
    pub max_path_length: usize,
    /// Pairs with fewer retained paths are not eligible.
    pub min_solutions: usize,
    pub solution_weight: u32,
    pub variety_weight: u32,
    pub volume_steps: Vec<VolumeStep>,
    pub uniqueness_floor: f64,
    pub uniqueness_span: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_path_length: 2,
            max_path_length: 8,
            min_solutions: 2,
            solution_weight: 2,
            variety_weight: 3,
            volume_steps: vec![
                VolumeStep { min_paths: 20, bonus: 10 },
                VolumeStep { min_paths: 15, bonus: 7 },
                VolumeStep { min_paths: 10, bonus: 5 },
            ],
            uniqueness_floor: 4.0,
            uniqueness_span: 95.0,
        }
    }
}

/// A difficulty tier: pairs whose quality-filtered shortest path falls in the window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub min_shortest: usize,
    pub max_shortest: usize,
}

impl TierConfig {
    pub fn accepts(&self, shortest: usize) -> bool {
        (self.min_shortest..=self.max_shortest).contains(&shortest)
    }
}

/// Random pair sampling budget
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_attempts: usize,
    /// Pairs kept per tier after ranking.
    pub pairs_per_tier: usize,
    /// Sampling stops once `pairs_per_tier * candidate_multiplier` candidates were found.
    pub candidate_multiplier: usize,
    /// Pairs drawn and evaluated together in parallel.
    pub batch_size: usize,
    pub seed: Option<u64>,
    pub tiers: Vec<TierConfig>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2000,
            pairs_per_tier: 150,
            candidate_multiplier: 3,
            batch_size: 64,
            seed: None,
            tiers: vec![
                TierConfig {
                    name: "easy".to_string(),
                    min_shortest: 2,
                    max_shortest: 3,
                },
                TierConfig {
                    name: "hard".to_string(),
                    min_shortest: 4,
                    max_shortest: 8,
                },
            ],
        }
    }
}

impl SelectionConfig {
    pub fn target_candidates(&self) -> usize {
        self.pairs_per_tier.saturating_mul(self.candidate_multiplier.max(1))
    }
}

/// Puzzle schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PuzzleConfig {
    pub days: usize,
    /// First slot date; today when unset.
    pub start_date: Option<NaiveDate>,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            days: 60,
            start_date: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in LINEYLINK_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("LINEYLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate TOML configuration text
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.aggregation.min_overlap_minutes >= 0.0) {
            anyhow::bail!("aggregation.min_overlap_minutes must be a non-negative number");
        }

        if self.search.max_path_length < 2 {
            anyhow::bail!("search.max_path_length must be at least 2");
        }

        if self.search.max_paths_per_length == 0 {
            anyhow::bail!("search.max_paths_per_length must be greater than 0");
        }

        if self.search.min_edge_share < 0.0 || self.search.min_edge_share > 100.0 {
            anyhow::bail!("search.min_edge_share must be between 0 and 100");
        }

        if self.scoring.min_path_length > self.scoring.max_path_length {
            anyhow::bail!("scoring.min_path_length must not exceed scoring.max_path_length");
        }

        if self.scoring.uniqueness_span <= 0.0 {
            anyhow::bail!("scoring.uniqueness_span must be greater than 0");
        }

        if self.selection.max_attempts == 0 {
            anyhow::bail!("selection.max_attempts must be greater than 0");
        }

        if self.selection.batch_size == 0 {
            anyhow::bail!("selection.batch_size must be greater than 0");
        }

        if self.selection.tiers.is_empty() {
            anyhow::bail!("selection.tiers must define at least one tier");
        }

        for tier in &self.selection.tiers {
            if tier.min_shortest > tier.max_shortest {
                anyhow::bail!(
                    "tier '{}': min_shortest must not exceed max_shortest",
                    tier.name
                );
            }
            if tier.max_shortest > self.search.max_path_length {
                anyhow::bail!(
                    "tier '{}': max_shortest exceeds search.max_path_length ({})",
                    tier.name,
                    self.search.max_path_length
                );
            }
        }

        Ok(())
    }
}
