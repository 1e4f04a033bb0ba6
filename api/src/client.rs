use crate::wire::{
    BatchRequest, MatchesPayload, MatchesResponse, WireId, WireInstant, WireMatch, WireScorer,
};
use crate::{BatchMeta, GoalKind, MatchBatch, MatchRecord, Scorer};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, StatusCode, Url};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_API_URL: &str = "https://watchasports.com/stream.php";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Which request shape the deployment speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// One POST carrying `{"matchIds": [...]}`.
    Batched { url: String },
    /// Two GETs issued concurrently. Live entries win over scheduled ones.
    Split { live_url: String, scheduled_url: String },
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Batched { url: DEFAULT_API_URL.to_owned() }
    }
}

/// Score API client.
#[derive(Debug, Clone)]
pub struct ScoresApi {
    client: Client,
    endpoint: Endpoint,
    query: Vec<(String, String)>,
    timeout: Duration,
}

impl Default for ScoresApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("livescore/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            endpoint: Endpoint::default(),
            query: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Timeout(String),
    Status(StatusCode, String),
    Parsing(reqwest::Error, String),
    /// The API answered but flagged the request as failed (`success: false`
    /// or no `matches` field).
    Rejected(String),
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Timeout(url) => write!(f, "Request to {url} timed out"),
            ApiError::Status(status, url) => write!(f, "HTTP {status} from {url}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Rejected(msg) => write!(f, "API rejected request: {msg}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ScoresApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Extra query parameter sent on GET requests (competition, timezone, ...).
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the current state of `ids`.
    ///
    /// The batched shape only asks for `ids`; the split shape returns whatever
    /// the live and scheduled feeds carry. Both sides of a split fetch must
    /// succeed.
    pub async fn fetch_matches(&self, ids: &[String]) -> ApiResult<MatchBatch> {
        match &self.endpoint {
            Endpoint::Batched { url } => self.post_batch(url, ids).await,
            Endpoint::Split { live_url, scheduled_url } => {
                let (live, scheduled) =
                    futures_util::join!(self.get_feed(live_url), self.get_feed(scheduled_url));
                let mut batch = scheduled?;
                batch.overlay(live?);
                Ok(batch)
            }
        }
    }

    async fn post_batch(&self, url: &str, ids: &[String]) -> ApiResult<MatchBatch> {
        debug!("requesting {} matches from {url}", ids.len());
        let request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(CACHE_CONTROL, "no-cache")
            .json(&BatchRequest { match_ids: ids });
        let raw = self.send(request, url).await?;
        into_batch(raw)
    }

    async fn get_feed(&self, url: &str) -> ApiResult<MatchBatch> {
        let mut params = self.query.clone();
        params.push(("_t".to_owned(), Utc::now().timestamp_millis().to_string()));
        let full = Url::parse_with_params(url, &params)
            .map_err(|e| ApiError::Other(format!("invalid url {url}: {e}")))?;

        debug!("requesting feed {full}");
        let request = self
            .client
            .get(full)
            .timeout(self.timeout)
            .header(CACHE_CONTROL, "no-cache");
        let raw = self.send(request, url).await?;
        into_batch(raw)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> ApiResult<MatchesResponse> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(url.to_owned())
            } else {
                ApiError::Network(e, url.to_owned())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status, url.to_owned()));
        }

        response.json::<MatchesResponse>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(url.to_owned())
            } else {
                ApiError::Parsing(e, url.to_owned())
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Mapping: wire types → clean domain types
// ---------------------------------------------------------------------------

fn into_batch(raw: MatchesResponse) -> ApiResult<MatchBatch> {
    if !raw.success {
        return Err(ApiError::Rejected(
            raw.error.unwrap_or_else(|| "Invalid API response".into()),
        ));
    }
    let Some(payload) = raw.matches else {
        return Err(ApiError::Rejected("response carried no matches".into()));
    };

    let matches: HashMap<String, MatchRecord> = match payload {
        MatchesPayload::List(list) => list
            .into_iter()
            .filter_map(|value| map_match(None, decode_match(value)?))
            .map(|m| (m.id.clone(), m))
            .collect(),
        MatchesPayload::Map(map) => map
            .into_iter()
            .filter_map(|(key, value)| map_match(Some(key), decode_match(value)?))
            .map(|m| (m.id.clone(), m))
            .collect(),
    };

    Ok(MatchBatch {
        matches,
        meta: raw.meta.map(|m| BatchMeta { requested: m.requested, delivered: m.delivered }),
    })
}

fn decode_match(value: serde_json::Value) -> Option<WireMatch> {
    match serde_json::from_value(value) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("dropping malformed match record: {e}");
            None
        }
    }
}

/// Map one wire record. `key` is the map key for the keyed payload shape and
/// only used when the record carries no id of its own. Records without any
/// id are dropped.
fn map_match(key: Option<String>, m: WireMatch) -> Option<MatchRecord> {
    let id = m
        .id
        .map(WireId::into_string)
        .filter(|id| !id.is_empty())
        .or(key.filter(|k| !k.trim().is_empty()))?;

    let is_live = m.is_live.unwrap_or(false);
    let mut status = m.status.filter(|s| !s.trim().is_empty());
    if is_live && status.is_none() {
        status = Some("live".into());
    }

    let kickoff = m
        .timestamp
        .and_then(parse_instant)
        .or_else(|| m.utc_date.as_deref().and_then(parse_date));

    Some(MatchRecord {
        id,
        home: m.home.unwrap_or_default(),
        away: m.away.unwrap_or_default(),
        home_score: m.home_score.and_then(|n| n.as_u32()).unwrap_or_default(),
        away_score: m.away_score.and_then(|n| n.as_u32()).unwrap_or_default(),
        status,
        is_live,
        is_finished: m.is_finished.unwrap_or(false),
        clock_minute: m.current_time.and_then(|n| n.as_u32()),
        added_time: m.added_time.and_then(|n| n.as_u32()),
        kickoff,
        home_logo: m.home_logo.filter(|l| !l.is_empty()),
        away_logo: m.away_logo.filter(|l| !l.is_empty()),
        home_scorers: map_scorers(m.home_scorers),
        away_scorers: map_scorers(m.away_scorers),
        matchday: m.matchday.and_then(|n| n.as_u32()),
        competition: m.competition.and_then(|c| c.into_name()),
    })
}

fn map_scorers(raw: Option<Vec<WireScorer>>) -> Vec<Scorer> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|s| {
            let name = s.name.filter(|n| !n.trim().is_empty())?;
            Some(Scorer {
                name,
                minute: s.minute.and_then(|n| n.as_u32()),
                kind: s.kind.as_deref().map(GoalKind::from_wire).unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_instant(raw: WireInstant) -> Option<DateTime<Utc>> {
    match raw {
        WireInstant::Unix(n) => from_unix(n),
        WireInstant::Text(s) => match s.trim().parse::<i64>() {
            Ok(n) => from_unix(n),
            Err(_) => parse_date(&s),
        },
    }
}

fn from_unix(n: i64) -> Option<DateTime<Utc>> {
    // Millisecond timestamps are 13 digits for any date after 2001.
    if n.abs() >= 1_000_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
