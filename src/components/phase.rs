use chrono::{DateTime, FixedOffset, Local, Utc};
use livescore_api::MatchRecord;

// ---------------------------------------------------------------------------
// Status tokens
// ---------------------------------------------------------------------------

/// Status values that mean the match is over.
pub const FINISHED_STATUSES: &[&str] = &[
    "finished",
    "ft",
    "full time",
    "full-time",
    "fulltime",
    "ended",
    "final",
    "aet",
    "after extra time",
    "awarded",
];

pub const HALFTIME_STATUSES: &[&str] = &["halftime", "half time", "half-time", "ht"];

/// Interrupted states and the label shown for them.
const INTERRUPTED: &[(&str, &str)] = &[
    ("postponed", "Postponed"),
    ("cancelled", "Cancelled"),
    ("canceled", "Cancelled"),
    ("suspended", "Suspended"),
    ("abandoned", "Abandoned"),
];

fn normalize(status: &str) -> String {
    status.trim().to_lowercase().replace(['_', '-'], " ")
}

fn in_set(status: &str, set: &[&str]) -> bool {
    let status = normalize(status);
    set.iter().any(|token| normalize(token) == status)
}

pub fn is_finished_status(status: &str) -> bool {
    in_set(status, FINISHED_STATUSES)
}

pub fn is_halftime_status(status: &str) -> bool {
    in_set(status, HALFTIME_STATUSES)
}

fn interrupted_label(status: &str) -> Option<&'static str> {
    let status = normalize(status);
    INTERRUPTED
        .iter()
        .find(|(token, _)| status.contains(token))
        .map(|(_, label)| *label)
}

// ---------------------------------------------------------------------------
// Periods of play
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    FirstHalf,
    SecondHalf,
    ExtraFirst,
    ExtraSecond,
}

impl Period {
    /// Read the period from a status token. A bare "extra time" is split by
    /// the clock since the API does not always say which half it is.
    fn detect(status: &str, minute: Option<u32>) -> Option<Period> {
        let s = normalize(status);
        let first = s.contains("1st") || s.contains("first");
        let second = s.contains("2nd") || s.contains("second");

        if s.contains("extra") || s == "et" || s.starts_with("et ") {
            return if second {
                Some(Period::ExtraSecond)
            } else if first || minute.is_none_or(|m| m <= 105) {
                Some(Period::ExtraFirst)
            } else {
                Some(Period::ExtraSecond)
            };
        }
        if s.contains("half") && first {
            return Some(Period::FirstHalf);
        }
        if s.contains("half") && second {
            return Some(Period::SecondHalf);
        }
        None
    }

    fn nominal_minutes(self) -> u32 {
        match self {
            Period::FirstHalf => 45,
            Period::SecondHalf => 90,
            Period::ExtraFirst => 105,
            Period::ExtraSecond => 120,
        }
    }
}

/// Minute display with stoppage time folded onto the period's nominal end:
/// 47 in the first half is `45+2'`.
fn clock(minute: u32, added_time: Option<u32>, period: Option<Period>) -> String {
    let nominal = match period {
        Some(p) => p.nominal_minutes(),
        None if minute == 45 => 45,
        None => 90,
    };
    let added = added_time.unwrap_or(0);

    if minute > nominal {
        format!("{nominal}+{}'", minute - nominal)
    } else if minute == nominal && added > 0 {
        format!("{nominal}+{added}'")
    } else {
        format!("{minute}'")
    }
}

// ---------------------------------------------------------------------------
// Kickoff clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HourFormat {
    #[default]
    H24,
    H12,
}

/// How kickoff times are shown. Without a fixed offset the system's local
/// zone is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockStyle {
    pub hour_format: HourFormat,
    pub utc_offset: Option<FixedOffset>,
}

impl ClockStyle {
    pub fn kickoff(&self, at: DateTime<Utc>) -> String {
        let pattern = match self.hour_format {
            HourFormat::H24 => "%H:%M",
            HourFormat::H12 => "%I:%M %p",
        };
        match self.utc_offset {
            Some(offset) => at.with_timezone(&offset).format(pattern).to_string(),
            None => at.with_timezone(&Local).format(pattern).to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase label
// ---------------------------------------------------------------------------

/// Raw fields the phase label is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseInput<'a> {
    pub status: Option<&'a str>,
    pub clock_minute: Option<u32>,
    pub added_time: Option<u32>,
    pub is_live: bool,
    pub is_finished: bool,
    pub kickoff: Option<DateTime<Utc>>,
}

impl<'a> PhaseInput<'a> {
    pub fn from_record(record: &'a MatchRecord) -> Self {
        Self {
            status: record.status_str(),
            clock_minute: record.clock_minute,
            added_time: record.added_time,
            is_live: record.is_live,
            is_finished: record.is_finished,
            kickoff: record.kickoff,
        }
    }
}

/// Human-readable phase: `FT`, `HT`, `2nd half - 90+3'`, `Postponed`,
/// a kickoff time, the raw status, or `TBD`. Never fails.
pub fn format_phase(input: &PhaseInput<'_>, style: &ClockStyle) -> String {
    let status = input.status.map(str::trim).filter(|s| !s.is_empty());

    if input.is_finished || status.is_some_and(is_finished_status) {
        return "FT".into();
    }
    if status.is_some_and(is_halftime_status) {
        return "HT".into();
    }

    let period = status.and_then(|s| Period::detect(s, input.clock_minute));
    let in_play = input.is_live || period.is_some();

    if in_play && let Some(minute) = input.clock_minute {
        let clock = clock(minute, input.added_time, period);
        return match (period, status) {
            (Some(Period::ExtraFirst), _) => format!("ET 1st - {clock}"),
            (Some(Period::ExtraSecond), _) => format!("ET 2nd - {clock}"),
            (Some(_), Some(label)) => format!("{label} - {clock}"),
            _ => clock,
        };
    }

    if let Some(label) = status.and_then(interrupted_label) {
        return label.into();
    }

    if in_play {
        // Live without a clock: the status is the best we have.
        return match status {
            Some(label) if !label.eq_ignore_ascii_case("live") => label.to_owned(),
            _ => "Live".into(),
        };
    }

    match (input.kickoff, status) {
        (Some(at), _) => style.kickoff(at),
        (None, Some(label)) => label.to_owned(),
        (None, None) => "TBD".into(),
    }
}

pub fn phase_label(record: &MatchRecord, style: &ClockStyle) -> String {
    format_phase(&PhaseInput::from_record(record), style)
}
