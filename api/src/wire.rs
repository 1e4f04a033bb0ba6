/// Raw wire types for the score API: serde shapes for deserializing responses.
/// These map to the clean domain types via the mapping functions in client.rs.
///
/// The API has shipped several field spellings over time, so most fields carry
/// aliases and lenient value types.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct MatchesResponse {
    #[serde(default)]
    pub success: bool,
    pub matches: Option<MatchesPayload>,
    pub error: Option<String>,
    pub meta: Option<WireMeta>,
}

/// `matches` arrives either as an array of records or keyed by match id.
/// Records stay raw here and are decoded one at a time, so a single malformed
/// record cannot sink the whole response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MatchesPayload {
    List(Vec<serde_json::Value>),
    Map(HashMap<String, serde_json::Value>),
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct WireMeta {
    pub requested: Option<u32>,
    pub delivered: Option<u32>,
}

/// Body of the batched POST.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest<'a> {
    pub match_ids: &'a [String],
}

// ---------------------------------------------------------------------------
// Match record
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WireMatch {
    #[serde(alias = "matchId", alias = "match_id")]
    pub id: Option<WireId>,
    #[serde(alias = "homeTeam", alias = "home_team")]
    pub home: Option<String>,
    #[serde(alias = "awayTeam", alias = "away_team")]
    pub away: Option<String>,
    #[serde(alias = "home_score")]
    pub home_score: Option<Numeric>,
    #[serde(alias = "away_score")]
    pub away_score: Option<Numeric>,
    pub status: Option<String>,
    #[serde(alias = "is_live")]
    pub is_live: Option<bool>,
    #[serde(alias = "is_finished")]
    pub is_finished: Option<bool>,
    #[serde(alias = "matchTime", alias = "minute")]
    pub current_time: Option<Numeric>,
    #[serde(alias = "injuryTime", alias = "added_time")]
    pub added_time: Option<Numeric>,
    pub timestamp: Option<WireInstant>,
    pub utc_date: Option<String>,
    pub home_logo: Option<String>,
    pub away_logo: Option<String>,
    pub home_scorers: Option<Vec<WireScorer>>,
    pub away_scorers: Option<Vec<WireScorer>>,
    pub matchday: Option<Numeric>,
    pub competition: Option<WireCompetition>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WireScorer {
    #[serde(alias = "player")]
    pub name: Option<String>,
    pub minute: Option<Numeric>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Int(u64),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s.trim().to_owned(),
            WireId::Int(n) => n.to_string(),
        }
    }
}

/// Scores and minutes show up as numbers, numeric strings ("90+3" included) or null.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum Numeric {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Numeric {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Numeric::Int(n) => u32::try_from(*n).ok(),
            Numeric::Float(f) if f.is_finite() && *f >= 0.0 => Some(f.trunc() as u32),
            Numeric::Float(_) => None,
            Numeric::Text(s) => {
                // "45+2" → 45; the stoppage part is carried separately when present.
                let head = s.trim().trim_end_matches('\'').split('+').next()?;
                head.trim().parse().ok()
            }
        }
    }
}

/// Kickoff as unix seconds/millis or a date string.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum WireInstant {
    Unix(i64),
    Text(String),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum WireCompetition {
    Name(String),
    Detailed { name: Option<String> },
}

impl WireCompetition {
    pub fn into_name(self) -> Option<String> {
        match self {
            WireCompetition::Name(name) => Some(name),
            WireCompetition::Detailed { name } => name,
        }
        .filter(|n| !n.trim().is_empty())
    }
}
