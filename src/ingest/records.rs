//! Raw provider record shapes and their conversion into strict types.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use super::{ContextBatch, Entity, EntityId, IntervalRecord};
use crate::config::AggregationConfig;
use crate::error::{LinkError, Result};

/// Top-level shift chart document: `{ "data": [ ... ] }`.
#[derive(Debug, Deserialize)]
struct RawShiftChart {
    #[serde(default)]
    data: Option<Vec<JsonValue>>,
}

/// One shift as published by the provider. Every field is optional here;
/// validation happens in `RawShift::into_record`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShift {
    player_id: Option<u64>,
    team_id: Option<u64>,
    period: Option<u32>,
    game_id: Option<u64>,
    start_time: Option<String>,
    end_time: Option<String>,
}

impl RawShift {
    fn into_record(self, context_id: u64) -> Option<IntervalRecord> {
        let start = parse_clock(self.start_time.as_deref()?)?;
        let end = parse_clock(self.end_time.as_deref()?)?;
        if end <= start {
            return None;
        }
        Some(IntervalRecord {
            entity_id: EntityId(self.player_id?),
            context_id,
            sub_context: self.period?,
            partition_key: self.team_id?,
            start,
            end,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct LocalizedText {
    #[serde(default)]
    default: Option<String>,
}

/// Season identifiers show up both as numbers (`20232024`) and strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeasonLabel {
    Number(u64),
    Text(String),
}

impl SeasonLabel {
    fn into_string(self) -> String {
        match self {
            SeasonLabel::Number(n) => n.to_string(),
            SeasonLabel::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeasonTotal {
    #[serde(default)]
    season: Option<SeasonLabel>,
    #[serde(default)]
    team_name: Option<LocalizedText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlayer {
    player_id: Option<u64>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    first_name: Option<LocalizedText>,
    #[serde(default)]
    last_name: Option<LocalizedText>,
    #[serde(default)]
    season_totals: Vec<JsonValue>,
}

fn clock_regex() -> &'static Regex {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    CLOCK.get_or_init(|| Regex::new(r"^(\d{1,3}):([0-5]\d)$").expect("Invalid clock regex"))
}

/// Convert an `MM:SS` game clock to seconds. Returns `None` for anything else.
pub fn parse_clock(clock: &str) -> Option<u32> {
    let caps = clock_regex().captures(clock.trim())?;
    let minutes: u32 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60 + seconds)
}

/// Parse one game's shift chart into a context batch.
///
/// `context_hint` is the game id derived from the file name; when absent the
/// first record carrying a `gameId` decides. Individual malformed shifts are
/// skipped and counted in `ContextBatch::skipped`; only an unreadable document
/// is an error.
pub fn parse_shift_chart(
    content: &str,
    context_hint: Option<u64>,
    period_label: &str,
) -> Result<ContextBatch> {
    let chart: RawShiftChart = serde_json::from_str(content)
        .map_err(|e| LinkError::Parse(format!("shift chart: {}", e)))?;

    let raw = chart.data.unwrap_or_default();
    let shifts: Vec<Option<RawShift>> = raw
        .into_iter()
        .map(|value| serde_json::from_value::<RawShift>(value).ok())
        .collect();

    let context_id = context_hint.or_else(|| shifts.iter().flatten().find_map(|s| s.game_id));
    let context_id = match context_id {
        Some(id) => id,
        None if shifts.is_empty() => 0,
        None => return Err(LinkError::Parse("shift chart has no game id".to_string())),
    };

    let mut batch = ContextBatch {
        context_id,
        period_label: period_label.to_string(),
        records: Vec::with_capacity(shifts.len()),
        skipped: 0,
    };

    for shift in shifts {
        match shift.and_then(|s| s.into_record(context_id)) {
            Some(record) => batch.records.push(record),
            None => batch.skipped += 1,
        }
    }

    Ok(batch)
}

/// Parse a player landing document into an entity.
///
/// The role is normalized through `policy`; an empty or missing role yields
/// `category = None`. Season entries without both a season and a team name
/// are ignored.
pub fn parse_entity(content: &str, policy: &AggregationConfig) -> Result<Entity> {
    let raw: RawPlayer = serde_json::from_str(content)
        .map_err(|e| LinkError::Parse(format!("player: {}", e)))?;

    let id = raw
        .player_id
        .map(EntityId)
        .ok_or_else(|| LinkError::Parse("player has no playerId".to_string()))?;

    let category = raw
        .position
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| policy.normalize_role(p));

    let first = raw.first_name.and_then(|t| t.default).unwrap_or_default();
    let last = raw.last_name.and_then(|t| t.default).unwrap_or_default();
    let name = if first.is_empty() || last.is_empty() {
        None
    } else {
        Some(format!("{} {}", first, last))
    };

    let mut entity = Entity {
        id,
        name,
        category,
        affiliations: Default::default(),
    };

    for value in raw.season_totals {
        let Ok(total) = serde_json::from_value::<RawSeasonTotal>(value) else {
            continue;
        };
        let season = total.season.map(SeasonLabel::into_string).unwrap_or_default();
        let team = total
            .team_name
            .and_then(|t| t.default)
            .unwrap_or_default();
        if !season.is_empty() && !team.is_empty() {
            entity = entity.with_affiliation(&season, &team);
        }
    }

    Ok(entity)
}
