use crate::components::phase::{is_finished_status, is_halftime_status};
use livescore_api::MatchRecord;

/// Whether the card should switch from the "scheduled" layout (names and
/// kickoff) to the "in progress" layout (names, scores, scorers).
///
/// Evaluated fresh for every record on every poll.
pub fn should_show_scores(record: &MatchRecord) -> bool {
    record.is_live
        || record.is_finished
        || record
            .status_str()
            .is_some_and(|s| is_finished_status(s) || is_halftime_status(s))
        || record.home_score > 0
        || record.away_score > 0
}

/// Coarse state driving the container's status class and the info list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Live,
    Finished,
    Scheduled,
}

impl MatchState {
    pub const ALL: [MatchState; 3] = [MatchState::Live, MatchState::Finished, MatchState::Scheduled];

    /// A terminal status wins over a stale live flag.
    pub fn of(record: &MatchRecord) -> Self {
        let status = record.status_str();
        if record.is_finished || status.is_some_and(is_finished_status) {
            MatchState::Finished
        } else if record.is_live || status.is_some_and(is_halftime_status) {
            MatchState::Live
        } else {
            MatchState::Scheduled
        }
    }

    pub fn container_class(self) -> &'static str {
        match self {
            MatchState::Live => "match-live",
            MatchState::Finished => "match-finished",
            MatchState::Scheduled => "match-scheduled",
        }
    }

    pub fn indicator_class(self) -> &'static str {
        match self {
            MatchState::Live => "status-live",
            MatchState::Finished => "status-finished",
            MatchState::Scheduled => "status-scheduled",
        }
    }

    pub fn info_label(self) -> &'static str {
        match self {
            MatchState::Live => "LIVE",
            MatchState::Finished => "FINAL",
            MatchState::Scheduled => "UPCOMING",
        }
    }
}
