//! Typed ingestion boundary.
//!
//! Raw provider JSON (shift charts, player landing pages) is parsed exactly
//! once into the strict shapes below; malformed records are dropped and
//! counted here so nothing downstream has to deal with missing fields.

pub mod records;
pub mod walker;

pub use records::{parse_clock, parse_entity, parse_shift_chart};
pub use walker::{
    discover_context_files, discover_entity_files, load_batch, load_entities, ContextFile,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{LinkError, Result};

/// Stable integer identity of an entity (player id).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

/// A (period, group) membership record, e.g. (season, team name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Affiliation {
    pub period: String,
    pub group: String,
}

impl Affiliation {
    pub fn new(period: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            group: group.into(),
        }
    }
}

/// A participant with a role and an affiliation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: Option<String>,
    /// Normalized role; `None` when the source had no usable role.
    pub category: Option<String>,
    pub affiliations: BTreeSet<Affiliation>,
}

impl Entity {
    pub fn new(id: EntityId, category: Option<&str>) -> Self {
        Self {
            id,
            name: None,
            category: category.map(str::to_string),
            affiliations: BTreeSet::new(),
        }
    }

    pub fn with_affiliation(mut self, period: &str, group: &str) -> Self {
        self.affiliations.insert(Affiliation::new(period, group));
        self
    }

    /// True when both entities share at least one (period, group) record.
    pub fn is_co_affiliated(&self, other: &Entity) -> bool {
        // Iterate the smaller set, look each up in the larger one.
        let (small, large) = if self.affiliations.len() <= other.affiliations.len() {
            (&self.affiliations, &other.affiliations)
        } else {
            (&other.affiliations, &self.affiliations)
        };
        small.iter().any(|a| large.contains(a))
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Player {}", self.id))
    }
}

/// All known entities keyed by id.
#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Like `get`, but a missing entity is an error.
    pub fn require(&self, id: EntityId) -> Result<&Entity> {
        self.get(id).ok_or(LinkError::UnknownEntity(id))
    }

    pub fn category(&self, id: EntityId) -> Option<&str> {
        self.get(id).and_then(|e| e.category.as_deref())
    }

    /// Unknown entities are never considered co-affiliated.
    pub fn co_affiliated(&self, a: EntityId, b: EntityId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a.is_co_affiliated(b),
            _ => false,
        }
    }

    pub fn display_name(&self, id: EntityId) -> String {
        self.get(id)
            .map(Entity::display_name)
            .unwrap_or_else(|| format!("Player {}", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Entity> for EntityDirectory {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        let mut directory = EntityDirectory::new();
        for entity in iter {
            directory.insert(entity);
        }
        directory
    }
}

/// One observed on-ice interval: `[start, end)` seconds within a sub-context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRecord {
    pub entity_id: EntityId,
    /// Grouping context, e.g. the game.
    pub context_id: u64,
    /// Sub-context, e.g. the period of play.
    pub sub_context: u32,
    /// Only records sharing a partition key can interact, e.g. the team.
    pub partition_key: u64,
    pub start: u32,
    pub end: u32,
}

impl IntervalRecord {
    pub fn duration_secs(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Length of the intersection of two intervals, 0 when disjoint.
    pub fn overlap_secs(&self, other: &IntervalRecord) -> u32 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}

/// All interval records of one grouping context, with the period label it was observed under.
#[derive(Debug, Clone, Default)]
pub struct ContextBatch {
    pub context_id: u64,
    /// Grouping-period label (season) attached to every edge this batch contributes to.
    pub period_label: String,
    pub records: Vec<IntervalRecord>,
    /// Records dropped at the boundary as malformed.
    pub skipped: usize,
}
