pub mod client;
pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Domain types: normalized, independent of the API wire format
// ---------------------------------------------------------------------------

/// Normalized state of one fixture.
///
/// Records are superseded, never merged: a newer fetch for the same `id`
/// replaces the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    pub home: String,
    pub away: String,
    pub home_score: u32,
    pub away_score: u32,
    /// Free-text phase token as delivered ("scheduled", "2nd half", "finished").
    /// Always `Some` when `is_live` is set.
    pub status: Option<String>,
    pub is_live: bool,
    /// Explicit finished flag from the API; status tokens are checked separately.
    pub is_finished: bool,
    pub clock_minute: Option<u32>,
    pub added_time: Option<u32>,
    pub kickoff: Option<DateTime<Utc>>,
    pub home_logo: Option<String>,
    pub away_logo: Option<String>,
    #[serde(default)]
    pub home_scorers: Vec<Scorer>,
    #[serde(default)]
    pub away_scorers: Vec<Scorer>,
    pub matchday: Option<u32>,
    pub competition: Option<String>,
}

impl MatchRecord {
    pub fn status_str(&self) -> Option<&str> {
        self.status.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorer {
    pub name: String,
    pub minute: Option<u32>,
    #[serde(default)]
    pub kind: GoalKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    #[default]
    Regular,
    OwnGoal,
    Penalty,
}

impl GoalKind {
    /// Map the API's free-text goal type. Unknown values count as regular goals.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "own_goal" | "owngoal" | "og" => GoalKind::OwnGoal,
            "penalty" | "pen" | "p" => GoalKind::Penalty,
            _ => GoalKind::Regular,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            GoalKind::Regular => "",
            GoalKind::OwnGoal => " (OG)",
            GoalKind::Penalty => " (P)",
        }
    }
}

/// Delivery counters the API may attach to a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchMeta {
    pub requested: Option<u32>,
    pub delivered: Option<u32>,
}

/// One successful fetch, normalized to an id → record map.
#[derive(Debug, Clone, Default)]
pub struct MatchBatch {
    pub matches: HashMap<String, MatchRecord>,
    pub meta: Option<BatchMeta>,
}

impl MatchBatch {
    pub fn live_count(&self) -> usize {
        self.matches.values().filter(|m| m.is_live).count()
    }

    /// Fold `other` into this batch. Entries of `other` replace entries with
    /// the same id, so the caller decides precedence by call order.
    pub fn overlay(&mut self, other: MatchBatch) {
        self.matches.extend(other.matches);
        if self.meta.is_none() {
            self.meta = other.meta;
        }
    }
}
