use crate::components::phase::{ClockStyle, HourFormat};
use crate::state::engine::{DEFAULT_MAX_RETRIES, EngineConfig};
use crate::state::fallback::{DEFAULT_STORE_FILE, Staleness};
use crate::state::refresher::IntervalPolicy;
use anyhow::{Context, anyhow, bail};
use chrono::{FixedOffset, TimeDelta};
use livescore_api::client::{DEFAULT_API_URL, DEFAULT_TIMEOUT, Endpoint};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COMPETITION: &str = "PL";
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub page: PathBuf,
    pub output: PathBuf,
    pub endpoint: Endpoint,
    pub competition: String,
    pub timezone: String,
    pub store: PathBuf,
    pub intervals: IntervalPolicy,
    pub fetch_timeout: Duration,
    pub max_retries: u32,
    pub clock: ClockStyle,
    pub staleness: Staleness,
}

impl AppSettings {
    /// Read settings from `LIVESCORE_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let page = var("LIVESCORE_PAGE")
            .map(PathBuf::from)
            .context("LIVESCORE_PAGE must name the HTML page to update")?;
        let output = var("LIVESCORE_OUTPUT").map(PathBuf::from).unwrap_or_else(|| page.clone());

        let endpoint = match (var("LIVESCORE_LIVE_URL"), var("LIVESCORE_SCHEDULED_URL")) {
            (Some(live_url), Some(scheduled_url)) => Endpoint::Split { live_url, scheduled_url },
            (None, None) => Endpoint::Batched {
                url: var("LIVESCORE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            },
            _ => bail!("LIVESCORE_LIVE_URL and LIVESCORE_SCHEDULED_URL must be set together"),
        };

        let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match var(key) {
                Some(raw) => parse::<u64>(key, &raw).map(Duration::from_secs),
                None => Ok(default),
            }
        };
        let defaults = IntervalPolicy::default();
        let intervals = IntervalPolicy {
            live: secs("LIVESCORE_LIVE_INTERVAL_SECS", defaults.live)?,
            idle: secs("LIVESCORE_IDLE_INTERVAL_SECS", defaults.idle)?,
            max_backoff: secs("LIVESCORE_MAX_BACKOFF_SECS", defaults.max_backoff)?,
        };
        if intervals.live.is_zero() || intervals.idle.is_zero() {
            bail!("poll intervals must be at least one second");
        }

        let hour_format = match var("LIVESCORE_CLOCK").as_deref() {
            None | Some("24h") | Some("24") => HourFormat::H24,
            Some("12h") | Some("12") => HourFormat::H12,
            Some(other) => bail!("LIVESCORE_CLOCK must be 24h or 12h, got {other:?}"),
        };
        let utc_offset = var("LIVESCORE_UTC_OFFSET")
            .map(|raw| {
                FixedOffset::from_str(&raw)
                    .map_err(|e| anyhow!("LIVESCORE_UTC_OFFSET: invalid offset {raw:?}: {e}"))
            })
            .transpose()?;

        let staleness = match var("LIVESCORE_STALE_AFTER_SECS") {
            Some(raw) => {
                let secs = parse::<u32>("LIVESCORE_STALE_AFTER_SECS", &raw)?;
                Staleness::MaxAge(TimeDelta::seconds(i64::from(secs)))
            }
            None => Staleness::Never,
        };

        Ok(Self {
            page,
            output,
            endpoint,
            competition: var("LIVESCORE_COMPETITION").unwrap_or_else(|| DEFAULT_COMPETITION.to_owned()),
            timezone: var("LIVESCORE_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned()),
            store: var("LIVESCORE_STORE").map(PathBuf::from).unwrap_or_else(|| DEFAULT_STORE_FILE.into()),
            intervals,
            fetch_timeout: secs("LIVESCORE_TIMEOUT_SECS", DEFAULT_TIMEOUT)?,
            max_retries: match var("LIVESCORE_MAX_RETRIES") {
                Some(raw) => parse("LIVESCORE_MAX_RETRIES", &raw)?,
                None => DEFAULT_MAX_RETRIES,
            },
            clock: ClockStyle { hour_format, utc_offset },
            staleness,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fetch_timeout: self.fetch_timeout,
            max_retries: self.max_retries,
            clock: self.clock,
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key}: invalid value {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<AppSettings> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        AppSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_a_page() {
        let s = settings(&[("LIVESCORE_PAGE", "index.html")]).unwrap();
        assert_eq!(s.output, PathBuf::from("index.html"));
        assert_eq!(s.endpoint, Endpoint::Batched { url: DEFAULT_API_URL.into() });
        assert_eq!(s.competition, "PL");
        assert_eq!(s.timezone, "Asia/Kolkata");
        assert_eq!(s.store, PathBuf::from(DEFAULT_STORE_FILE));
        assert_eq!(s.intervals, IntervalPolicy::default());
        assert_eq!(s.fetch_timeout, Duration::from_secs(15));
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.clock, ClockStyle::default());
        assert_eq!(s.staleness, Staleness::Never);
    }

    #[test]
    fn page_is_required() {
        let err = settings(&[]).unwrap_err();
        assert!(err.to_string().contains("LIVESCORE_PAGE"));
    }

    #[test]
    fn split_endpoint_needs_both_urls() {
        let s = settings(&[
            ("LIVESCORE_PAGE", "p.html"),
            ("LIVESCORE_LIVE_URL", "https://api.example/live"),
            ("LIVESCORE_SCHEDULED_URL", "https://api.example/today"),
        ])
        .unwrap();
        assert_eq!(
            s.endpoint,
            Endpoint::Split {
                live_url: "https://api.example/live".into(),
                scheduled_url: "https://api.example/today".into(),
            }
        );

        let err = settings(&[("LIVESCORE_PAGE", "p.html"), ("LIVESCORE_LIVE_URL", "x")]).unwrap_err();
        assert!(err.to_string().contains("set together"));
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("LIVESCORE_PAGE", "p.html"),
            ("LIVESCORE_OUTPUT", "out.html"),
            ("LIVESCORE_LIVE_INTERVAL_SECS", "15"),
            ("LIVESCORE_IDLE_INTERVAL_SECS", "60"),
            ("LIVESCORE_TIMEOUT_SECS", "5"),
            ("LIVESCORE_MAX_RETRIES", "1"),
            ("LIVESCORE_CLOCK", "12h"),
            ("LIVESCORE_UTC_OFFSET", "+05:30"),
            ("LIVESCORE_STALE_AFTER_SECS", "3600"),
        ])
        .unwrap();
        assert_eq!(s.output, PathBuf::from("out.html"));
        assert_eq!(s.intervals.live, Duration::from_secs(15));
        assert_eq!(s.intervals.idle, Duration::from_secs(60));
        assert_eq!(s.engine_config().fetch_timeout, Duration::from_secs(5));
        assert_eq!(s.engine_config().max_retries, 1);
        assert_eq!(s.clock.hour_format, HourFormat::H12);
        assert_eq!(s.clock.utc_offset, FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(s.staleness, Staleness::MaxAge(TimeDelta::hours(1)));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (key, value) in [
            ("LIVESCORE_LIVE_INTERVAL_SECS", "soon"),
            ("LIVESCORE_MAX_RETRIES", "-1"),
            ("LIVESCORE_UTC_OFFSET", "IST"),
            ("LIVESCORE_CLOCK", "36h"),
        ] {
            let err = settings(&[("LIVESCORE_PAGE", "p.html"), (key, value)]).unwrap_err();
            assert!(format!("{err:#}").contains(key), "{key}: {err:#}");
        }
    }
}
