use crate::state::network::LoadingState;
use yenitv_api::{FeedOrigin, NormalizedMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRequest {
    /// Load matches, served from cache when it's still fresh.
    LoadMatches,
    /// Bypass the cache and report whether live data came back.
    Refresh,
}

#[derive(Debug)]
pub enum NetworkResponse {
    LoadingStateChanged { loading_state: LoadingState },
    /// Full replacement of the match collection.
    MatchesLoaded {
        matches: Vec<NormalizedMatch>,
        fetched_at_ms: i64,
        origin: FeedOrigin,
    },
    RefreshFinished { ok: bool },
}
