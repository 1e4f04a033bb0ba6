use chrono::{DateTime, Utc};
use ego_tree::NodeId;

use crate::components::phase::{ClockStyle, phase_label};
use crate::components::policy::{MatchState, should_show_scores};
use crate::page::{Page, RenderError, escape_text};
use livescore_api::{MatchRecord, Scorer};

pub const STALE_CLASS: &str = "match-stale";
pub const DEFAULT_COMPETITION: &str = "Premier League";
pub const CONNECTION_ERROR: &str = "⚠️ Connection Error";

/// Where a rendered record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Live,
    Fallback { captured_at: DateTime<Utc> },
}

impl Provenance {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }
}

/// Apply one record to its card. Required nodes are checked before anything
/// is written, so a malformed card is left exactly as it was.
pub fn render(
    page: &mut Page,
    record: &MatchRecord,
    provenance: Provenance,
    style: &ClockStyle,
) -> Result<(), RenderError> {
    let target = page
        .target(&record.id)
        .ok_or_else(|| RenderError::UnknownMatch(record.id.clone()))?;
    let missing = |element| RenderError::MissingElement { id: record.id.clone(), element };
    let home = target.home_name.ok_or_else(|| missing("home team"))?;
    let away = target.away_name.ok_or_else(|| missing("away team"))?;
    let time = target.time.ok_or_else(|| missing("time"))?;

    let state = MatchState::of(record);
    let show_scores = should_show_scores(record);

    if show_scores {
        page.set_inner_html(
            home,
            &format!("{} <b>({})</b>", escape_text(&record.home), record.home_score),
        );
        page.set_inner_html(
            away,
            &format!("<b>({})</b> {}", record.away_score, escape_text(&record.away)),
        );
    } else {
        page.set_text(home, &record.home);
        page.set_text(away, &record.away);
    }

    for (node, scorers) in [
        (target.home_scorers, &record.home_scorers),
        (target.away_scorers, &record.away_scorers),
    ] {
        if let Some(node) = node {
            let markup = if show_scores { scorer_list(scorers) } else { String::new() };
            page.set_inner_html(node, &markup);
        }
    }

    page.set_inner_html(
        time,
        &format!(
            "<span class=\"status-indicator {}\"></span>{}",
            state.indicator_class(),
            escape_text(&phase_label(record, style))
        ),
    );

    if let Some(info) = target.info {
        page.set_inner_html(info, &info_items(record, state));
    }

    let unwritable = |element| RenderError::Unwritable { id: record.id.clone(), element };
    for (node, url, team, element) in [
        (target.home_logo, record.home_logo.as_deref(), &record.home, "home logo"),
        (target.away_logo, record.away_logo.as_deref(), &record.away, "away logo"),
    ] {
        if !draw_logo(page, node, url, team) {
            return Err(unwritable(element));
        }
    }

    let mut add = vec![state.container_class()];
    if provenance.is_degraded() {
        add.push(STALE_CLASS);
    }
    let remove: Vec<&str> = MatchState::ALL
        .iter()
        .map(|s| s.container_class())
        .chain([STALE_CLASS])
        .collect();
    if !page.set_classes(target.container, &remove, &add) {
        return Err(unwritable("container"));
    }

    let captured = match provenance {
        Provenance::Live => String::new(),
        Provenance::Fallback { captured_at } => captured_at.to_rfc3339(),
    };
    let source = if provenance.is_degraded() { "fallback" } else { "live" };
    let stamped = page.set_attrs(
        target.container,
        &[("data-provenance", source), ("data-captured-at", captured.as_str())],
    );
    if !stamped {
        return Err(unwritable("container"));
    }

    Ok(())
}

fn scorer_list(scorers: &[Scorer]) -> String {
    if scorers.is_empty() {
        return String::new();
    }
    let items: String = scorers
        .iter()
        .map(|s| format!("<li>{}</li>", escape_text(&scorer_line(s))))
        .collect();
    format!("<ul>{items}</ul>")
}

/// `Saka 23' (P)`. A scorer without a minute is shown by name only.
pub fn scorer_line(scorer: &Scorer) -> String {
    match scorer.minute {
        Some(minute) => format!("{} {minute}'{}", scorer.name, scorer.kind.suffix()),
        None => format!("{}{}", scorer.name, scorer.kind.suffix()),
    }
}

fn info_items(record: &MatchRecord, state: MatchState) -> String {
    let competition = record
        .competition
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COMPETITION);
    let detail = match record.matchday {
        Some(n) => format!("Matchday {n}"),
        None => competition.to_owned(),
    };
    format!(
        "<li><span>{}</span></li><li><span><b>{}</b></span></li><li><span class=\"lgnm\">{}</span></li>",
        state.info_label(),
        escape_text(&competition.to_uppercase()),
        escape_text(&detail)
    )
}

/// False only when a logo that needed changing could not be written.
fn draw_logo(page: &mut Page, node: Option<NodeId>, url: Option<&str>, team: &str) -> bool {
    let (Some(node), Some(url)) = (node, url.map(str::trim).filter(|u| !u.is_empty())) else {
        return true;
    };
    if page.attr(node, "src").as_deref() == Some(url) {
        return true;
    }
    page.set_attrs(node, &[("src", url), ("alt", team), ("title", team)])
}

/// Header line above the cards.
pub fn render_title(page: &mut Page, live_count: usize) {
    let Some(title) = page.title() else {
        return;
    };
    if live_count > 0 {
        page.set_text(title, &format!("🔴 Live Matches ({live_count})"));
    } else {
        page.set_text(title, "Today's Matches");
    }
}

/// Page-level status slot. `None` clears it.
pub fn render_status_slot(page: &mut Page, message: Option<&str>) {
    if let Some(slot) = page.status_slot() {
        page.set_text(slot, message.unwrap_or_default());
    }
}

/// Inline error for a match with nothing to fall back on. Only the time node
/// changes; names and scores stay as they were. Returns the markup it replaced.
pub fn render_connection_error(page: &mut Page, id: &str) -> Result<String, RenderError> {
    let time = time_node(page, id)?;
    let previous = page.inner_html(time);
    page.set_text(time, CONNECTION_ERROR);
    Ok(previous)
}

/// Put back what [`render_connection_error`] replaced, unless something has
/// been rendered over the error since.
pub fn clear_connection_error(page: &mut Page, id: &str, previous: &str) -> Result<(), RenderError> {
    let time = time_node(page, id)?;
    if page.display_text(time) == CONNECTION_ERROR {
        page.set_inner_html(time, previous);
    }
    Ok(())
}

fn time_node(page: &Page, id: &str) -> Result<NodeId, RenderError> {
    let target = page
        .target(id)
        .ok_or_else(|| RenderError::UnknownMatch(id.to_owned()))?;
    target.time.ok_or_else(|| RenderError::MissingElement {
        id: id.to_owned(),
        element: "time",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use livescore_api::GoalKind;

    const CARD_42: &str = r#"<html><body>
<div class="boxstitle"><strong>Today's Matches</strong></div>
<span id="score-status"></span>
<div class="match-card">
  <div id="42" class="match-container match-scheduled" data-start="2025-03-01T15:00:00Z">
    <div class="matchlogo left"><img src="/img/home.png"></div>
    <div class="matchname left">Home</div>
    <div class="matchTime"><span class="stsrt">15:00</span></div>
    <div class="matchname right">Away</div>
    <div class="matchlogo right"><img src="/img/away.png"></div>
  </div>
  <div class="scorers left"></div>
  <div class="scorers right"></div>
  <div class="info"><ul><li>UPCOMING</li></ul></div>
</div>
<div class="match-card">
  <div id="43" class="match-container" data-start="2025-03-01T17:30:00Z">
    <div class="matchname left">Everton</div>
    <div class="matchname right">Fulham</div>
  </div>
</div>
</body></html>"#;

    fn utc() -> ClockStyle {
        ClockStyle { utc_offset: FixedOffset::east_opt(0), ..Default::default() }
    }

    fn arsenal_chelsea() -> MatchRecord {
        MatchRecord {
            id: "42".into(),
            home: "Arsenal".into(),
            away: "Chelsea".into(),
            home_score: 1,
            away_score: 0,
            status: Some("2nd half".into()),
            is_live: true,
            clock_minute: Some(60),
            home_scorers: vec![Scorer { name: "Saka".into(), minute: Some(23), kind: GoalKind::Penalty }],
            ..Default::default()
        }
    }

    fn text_of(page: &Page, node: Option<NodeId>) -> String {
        page.display_text(node.unwrap())
    }

    #[test]
    fn live_record_shows_scores_and_clock() {
        let mut page = Page::parse(CARD_42);
        render(&mut page, &arsenal_chelsea(), Provenance::Live, &utc()).unwrap();

        let target = page.target("42").unwrap();
        assert_eq!(text_of(&page, target.home_name), "Arsenal (1)");
        assert_eq!(text_of(&page, target.away_name), "(0) Chelsea");
        assert_eq!(text_of(&page, target.time), "2nd half - 60'");
        assert_eq!(text_of(&page, target.home_scorers), "Saka 23' (P)");
        assert_eq!(text_of(&page, target.away_scorers), "");

        assert!(page.has_class(target.container, "match-live"));
        assert!(!page.has_class(target.container, "match-scheduled"));
        assert!(!page.has_class(target.container, STALE_CLASS));
        assert_eq!(page.attr(target.container, "data-provenance").as_deref(), Some("live"));
        assert!(page.to_html().contains("status-indicator status-live"));
    }

    #[test]
    fn scheduled_record_shows_plain_names_and_kickoff() {
        let mut page = Page::parse(CARD_42);
        let record = MatchRecord {
            id: "42".into(),
            home: "Arsenal".into(),
            away: "Chelsea".into(),
            status: Some("scheduled".into()),
            kickoff: Some(Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap()),
            matchday: Some(27),
            ..arsenal_chelsea()
        };
        let record = MatchRecord { is_live: false, home_score: 0, clock_minute: None, ..record };
        render(&mut page, &record, Provenance::Live, &utc()).unwrap();

        let target = page.target("42").unwrap();
        assert_eq!(text_of(&page, target.home_name), "Arsenal");
        assert_eq!(text_of(&page, target.away_name), "Chelsea");
        assert_eq!(text_of(&page, target.time), "15:00");
        assert_eq!(text_of(&page, target.home_scorers), "");
        assert_eq!(text_of(&page, target.info), "UPCOMING PREMIER LEAGUE Matchday 27");
        assert!(page.has_class(target.container, "match-scheduled"));
    }

    #[test]
    fn exactly_one_state_class_after_transitions() {
        let mut page = Page::parse(CARD_42);
        let live = arsenal_chelsea();
        let finished = MatchRecord { status: Some("FT".into()), is_live: false, ..live.clone() };

        render(&mut page, &live, Provenance::Live, &utc()).unwrap();
        render(&mut page, &finished, Provenance::Live, &utc()).unwrap();

        let target = page.target("42").unwrap();
        let present: Vec<_> = MatchState::ALL
            .iter()
            .filter(|s| page.has_class(target.container, s.container_class()))
            .collect();
        assert_eq!(present, vec![&MatchState::Finished]);
        assert_eq!(text_of(&page, target.time), "FT");
        assert!(page.has_class(target.container, "match-container"));
    }

    #[test]
    fn table_row_container_switches_state_class() {
        let mut page = Page::parse(
            r#"<html><body><table><tbody>
<tr id="42" class="match-card match-scheduled" data-start="2025-03-01T15:00:00Z">
  <td class="matchname left">Home</td>
  <td class="matchTime"><span class="stsrt">15:00</span></td>
  <td class="matchname right">Away</td>
</tr>
</tbody></table></body></html>"#,
        );
        render(&mut page, &arsenal_chelsea(), Provenance::Live, &utc()).unwrap();

        let target = page.target("42").unwrap();
        let present: Vec<_> = MatchState::ALL
            .iter()
            .filter(|s| page.has_class(target.container, s.container_class()))
            .collect();
        assert_eq!(present, vec![&MatchState::Live]);
        assert!(page.has_class(target.container, "match-card"));
        assert_eq!(text_of(&page, target.home_name), "Arsenal (1)");
        assert!(page.to_html().contains("<tr "));
    }

    #[test]
    fn fallback_provenance_marks_container_stale() {
        let mut page = Page::parse(CARD_42);
        let captured_at = Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap();
        render(&mut page, &arsenal_chelsea(), Provenance::Fallback { captured_at }, &utc()).unwrap();

        let container = page.target("42").unwrap().container;
        assert!(page.has_class(container, STALE_CLASS));
        assert_eq!(page.attr(container, "data-provenance").as_deref(), Some("fallback"));
        assert_eq!(
            page.attr(container, "data-captured-at").as_deref(),
            Some("2025-03-01T16:00:00+00:00")
        );

        render(&mut page, &arsenal_chelsea(), Provenance::Live, &utc()).unwrap();
        assert!(!page.has_class(container, STALE_CLASS));
    }

    #[test]
    fn missing_time_node_aborts_without_touching_the_card() {
        let mut page = Page::parse(CARD_42);
        let record = MatchRecord { id: "43".into(), ..arsenal_chelsea() };
        let err = render(&mut page, &record, Provenance::Live, &utc()).unwrap_err();
        assert_eq!(err, RenderError::MissingElement { id: "43".into(), element: "time" });

        let target = page.target("43").unwrap();
        assert_eq!(text_of(&page, target.home_name), "Everton");

        let unknown = MatchRecord { id: "404".into(), ..arsenal_chelsea() };
        assert_eq!(
            render(&mut page, &unknown, Provenance::Live, &utc()),
            Err(RenderError::UnknownMatch("404".into()))
        );
    }

    #[test]
    fn logos_update_only_when_url_changes() {
        let mut page = Page::parse(CARD_42);
        let record = MatchRecord {
            home_logo: Some("https://cdn.example/arsenal.png".into()),
            away_logo: Some("/img/away.png".into()),
            ..arsenal_chelsea()
        };
        render(&mut page, &record, Provenance::Live, &utc()).unwrap();

        let target = page.target("42").unwrap();
        let home = target.home_logo.unwrap();
        assert_eq!(page.attr(home, "src").as_deref(), Some("https://cdn.example/arsenal.png"));
        assert_eq!(page.attr(home, "title").as_deref(), Some("Arsenal"));
        assert_eq!(page.attr(target.away_logo.unwrap(), "title"), None);
    }

    #[test]
    fn info_list_prefers_matchday_then_competition() {
        let mut page = Page::parse(CARD_42);
        let record = MatchRecord { competition: Some("FA Cup".into()), ..arsenal_chelsea() };
        render(&mut page, &record, Provenance::Live, &utc()).unwrap();
        let info = page.target("42").unwrap().info;
        assert_eq!(text_of(&page, info), "LIVE FA CUP FA Cup");
    }

    #[test]
    fn scorer_lines_carry_goal_suffixes() {
        let og = Scorer { name: "Colwill".into(), minute: Some(71), kind: GoalKind::OwnGoal };
        assert_eq!(scorer_line(&og), "Colwill 71' (OG)");
        let unknown = Scorer { name: "Havertz".into(), minute: None, kind: GoalKind::Regular };
        assert_eq!(scorer_line(&unknown), "Havertz");
    }

    #[test]
    fn title_status_slot_and_connection_error() {
        let mut page = Page::parse(CARD_42);
        render_title(&mut page, 2);
        assert_eq!(page.display_text(page.title().unwrap()), "🔴 Live Matches (2)");
        render_title(&mut page, 0);
        assert_eq!(page.display_text(page.title().unwrap()), "Today's Matches");

        render_status_slot(&mut page, Some("Showing saved scores"));
        assert_eq!(page.display_text(page.status_slot().unwrap()), "Showing saved scores");
        render_status_slot(&mut page, None);
        assert_eq!(page.display_text(page.status_slot().unwrap()), "");

        let previous = render_connection_error(&mut page, "42").unwrap();
        assert_eq!(previous, "15:00");
        let target = page.target("42").unwrap();
        assert_eq!(text_of(&page, target.time), CONNECTION_ERROR);
        assert_eq!(text_of(&page, target.home_name), "Home");

        clear_connection_error(&mut page, "42", &previous).unwrap();
        assert_eq!(text_of(&page, target.time), "15:00");
    }
}
