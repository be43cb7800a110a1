use crate::state::app_settings::AppSettings;
use crate::state::app_state::AppState;
use crate::state::messages::NetworkResponse;
use crate::state::network::LoadingState;
use crate::streams::{PrioritizedSource, select_sources};
use crate::view::MatchView;
use log::debug;
use yenitv_api::{FeedOrigin, NormalizedMatch};

/// Outcome of a user-triggered refresh, for toast-style feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Failed,
}

impl RefreshOutcome {
    pub fn title(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated => "Matches Updated",
            RefreshOutcome::Failed => "Refresh Failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated => "Successfully refreshed match data",
            RefreshOutcome::Failed => "Failed to update matches. Please try again.",
        }
    }
}

/// What a presentation layer holds on to: settings plus mutable state.
pub struct App {
    pub settings: AppSettings,
    pub state: AppState,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_settings(AppSettings::load())
    }

    pub fn with_settings(settings: AppSettings) -> Self {
        if let Some(level) = settings.log_level {
            log::set_max_level(level);
        }
        Self { settings, state: AppState::new() }
    }

    // -----------------------------------------------------------------------
    // Network response handlers
    // -----------------------------------------------------------------------

    /// Apply a worker response. Returns the refresh outcome when one finished.
    pub fn handle_response(&mut self, response: NetworkResponse) -> Option<RefreshOutcome> {
        match response {
            NetworkResponse::LoadingStateChanged { loading_state } => {
                self.on_loading_changed(loading_state);
                None
            }
            NetworkResponse::MatchesLoaded { matches, fetched_at_ms, origin } => {
                self.on_matches_loaded(matches, fetched_at_ms, origin);
                None
            }
            NetworkResponse::RefreshFinished { ok } => Some(if ok {
                RefreshOutcome::Updated
            } else {
                RefreshOutcome::Failed
            }),
        }
    }

    pub fn on_matches_loaded(&mut self, matches: Vec<NormalizedMatch>, fetched_at_ms: i64, origin: FeedOrigin) {
        debug!("loaded {} matches via {origin:?}", matches.len());
        self.state.load(matches, fetched_at_ms, origin);
    }

    pub fn on_loading_changed(&mut self, loading: LoadingState) {
        self.state.loading = loading;
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Whether a read at `now_ms` should kick off a background reload.
    pub fn needs_reload(&self, now_ms: i64) -> bool {
        !self.state.loading.is_loading && self.state.is_stale(now_ms, self.settings.stale_after)
    }

    pub fn view(&self, now_ms: i64) -> MatchView {
        self.state.view(now_ms)
    }

    /// Streams worth offering for a match, best first. Empty for unknown ids.
    pub fn best_streams(&self, match_id: &str) -> Vec<PrioritizedSource> {
        self.state
            .find_match(match_id)
            .map(|m| select_sources(&m.sources))
            .unwrap_or_default()
    }
}
