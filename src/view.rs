use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use yenitv_api::NormalizedMatch;

/// Sport filter value that lets every category through.
pub const ALL_SPORTS: &str = "All";

/// User-chosen filters. Only explicit user actions change these. The sport
/// must match the category exactly as upstream sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub sport_category: String,
    pub search_query: String,
    pub selected_date: Option<String>,
    pub live_only: Option<bool>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            sport_category: ALL_SPORTS.to_owned(),
            search_query: String::new(),
            selected_date: None,
            live_only: None,
        }
    }
}

impl FilterState {
    pub fn accepts(&self, m: &NormalizedMatch, now_ms: i64) -> bool {
        if self.sport_category != ALL_SPORTS && m.sport_category != self.sport_category {
            return false;
        }
        if let Some(date) = &self.selected_date
            && &m.date_key != date
        {
            return false;
        }
        if self.live_only.unwrap_or(false) && !m.live_at(now_ms) {
            return false;
        }
        self.search_query.is_empty() || matches_query(m, &self.search_query.to_lowercase())
    }
}

fn matches_query(m: &NormalizedMatch, query: &str) -> bool {
    [
        Some(&m.title),
        Some(&m.tournament),
        Some(&m.sport_category),
        m.home_team.as_ref(),
        m.away_team.as_ref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(query))
}

/// Date key → matches on that date, ascending by start time.
pub type GroupedView = BTreeMap<String, Vec<NormalizedMatch>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchView {
    pub grouped: GroupedView,
    pub flat_sorted: Vec<NormalizedMatch>,
    /// Every date in the unfiltered collection, ascending.
    pub available_dates: Vec<String>,
    /// Live matches among `flat_sorted`.
    pub live_subset: Vec<NormalizedMatch>,
}

impl MatchView {
    pub fn total(&self) -> usize {
        self.flat_sorted.len()
    }

    pub fn live_count(&self) -> usize {
        self.live_subset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat_sorted.is_empty()
    }
}

pub fn derive_view(matches: &[NormalizedMatch], filters: &FilterState, now_ms: i64) -> MatchView {
    let mut flat_sorted: Vec<NormalizedMatch> = matches
        .iter()
        .filter(|m| filters.accepts(m, now_ms))
        .cloned()
        .collect();
    flat_sorted.sort_by_key(|m| m.start_time_ms);

    let mut grouped = GroupedView::new();
    for m in &flat_sorted {
        grouped.entry(m.date_key.clone()).or_default().push(m.clone());
    }

    let available_dates = matches
        .iter()
        .map(|m| m.date_key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let live_subset = flat_sorted.iter().filter(|m| m.live_at(now_ms)).cloned().collect();

    MatchView { grouped, flat_sorted, available_dates, live_subset }
}

// ---------------------------------------------------------------------------
// Per-date summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSummary {
    pub date: String,
    pub total: usize,
    pub live: usize,
}

pub fn date_summaries(view: &MatchView, now_ms: i64) -> Vec<DateSummary> {
    view.grouped
        .iter()
        .map(|(date, matches)| DateSummary {
            date: date.clone(),
            total: matches.len(),
            live: matches.iter().filter(|m| m.live_at(now_ms)).count(),
        })
        .collect()
}

/// `"Today"`, `"Tomorrow"`, or e.g. `"Monday, October 19"`. Keys that don't
/// parse as dates are returned as-is.
pub fn date_header(date_key: &str, today: NaiveDate) -> String {
    let Ok(date) = NaiveDate::parse_from_str(date_key, "%Y-%m-%d") else {
        return date_key.to_owned();
    };
    if date == today {
        "Today".to_owned()
    } else if today.succ_opt() == Some(date) {
        "Tomorrow".to_owned()
    } else {
        date.format("%A, %B %-d").to_string()
    }
}
