use crate::state::network::LoadingState;
use crate::view::{ALL_SPORTS, FilterState, MatchView, derive_view};
use std::time::Duration;
use yenitv_api::{FeedOrigin, NormalizedMatch};

/// Shown when every upstream attempt failed and the sample feed is on screen.
pub const SAMPLE_DATA_NOTICE: &str = "Using demo data. Check your connection and try refreshing.";

#[derive(Debug, Default)]
pub struct AppState {
    /// The whole collection from the latest load; never patched in place.
    pub matches: Vec<NormalizedMatch>,
    pub filters: FilterState,
    pub loaded_at_ms: Option<i64>,
    pub origin: Option<FeedOrigin>,
    pub loading: LoadingState,
    pub last_error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the match collection wholesale.
    pub fn load(&mut self, matches: Vec<NormalizedMatch>, fetched_at_ms: i64, origin: FeedOrigin) {
        self.matches = matches;
        self.loaded_at_ms = Some(fetched_at_ms);
        self.origin = Some(origin);
        self.last_error = origin.is_fallback().then(|| SAMPLE_DATA_NOTICE.to_owned());
    }

    /// Nothing loaded yet, or the last load is at least `stale_after` old.
    pub fn is_stale(&self, now_ms: i64, stale_after: Duration) -> bool {
        let stale_ms = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
        self.loaded_at_ms
            .is_none_or(|loaded| now_ms.saturating_sub(loaded) >= stale_ms)
    }

    pub fn is_using_sample(&self) -> bool {
        self.origin.is_some_and(|o| o.is_fallback())
    }

    pub fn view(&self, now_ms: i64) -> MatchView {
        derive_view(&self.matches, &self.filters, now_ms)
    }

    pub fn find_match(&self, id: &str) -> Option<&NormalizedMatch> {
        self.matches.iter().find(|m| m.id == id)
    }

    // -----------------------------------------------------------------------
    // Filter mutations (user actions only)
    // -----------------------------------------------------------------------

    pub fn set_sport(&mut self, sport: impl Into<String>) {
        self.filters.sport_category = sport.into();
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.filters.search_query = query.into();
    }

    pub fn select_date(&mut self, date: Option<String>) {
        self.filters.selected_date = date;
    }

    pub fn set_live_only(&mut self, live_only: bool) {
        self.filters.live_only = Some(live_only);
    }

    pub fn reset_filters(&mut self) {
        self.filters = FilterState {
            sport_category: ALL_SPORTS.to_owned(),
            live_only: Some(false),
            ..FilterState::default()
        };
    }
}
