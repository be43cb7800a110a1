pub mod client;
pub mod normalize;
pub mod transport;
pub mod wire;

pub use client::{FeedClient, FeedConfig, FeedError, FeedOrigin, FeedRequest, FeedResult, Fetched, MatchKind};
pub use normalize::normalize;
pub use transport::{Clock, HttpTransport, ManualClock, SystemClock, Transport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How long after its scheduled start a match counts as live.
pub const LIVE_WINDOW_MS: i64 = 3 * 3600 * 1000;
/// How far ahead of its start a match counts as upcoming.
pub const UPCOMING_WINDOW_MS: i64 = 3600 * 1000;
/// Categories flagged for highlighting. Compared case-sensitively.
pub const POPULAR_SPORTS: [&str; 4] = ["Football", "Basketball", "Baseball", "Soccer"];

// ---------------------------------------------------------------------------
// Canonical feed: every upstream shape is adapted into this before use
// ---------------------------------------------------------------------------

/// One scheduled event inside a date bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub unix_timestamp: i64,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub tournament: String,
    #[serde(rename = "match", default)]
    pub title: String,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Upstream display name per channel, by index. Missing or `None` entries
    /// fall back to a name taken from the channel URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_names: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
    /// Upstream's own highlight flag, on top of the popular-sports check.
    #[serde(default)]
    pub popular: bool,
}

/// Date-bucketed events, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeed {
    pub days: BTreeMap<String, Vec<RawEvent>>,
}

impl RawFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the end of its date bucket.
    pub fn push(&mut self, date: impl Into<String>, event: RawEvent) {
        self.days.entry(date.into()).or_default().push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }

    pub fn event_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMatch {
    /// `"{date}-{index within bucket}"`
    pub id: String,
    pub slug: String,
    pub title: String,
    pub sport_category: String,
    pub tournament: String,
    /// Date bucket the match came from. Grouping and date filters use this.
    pub date_key: String,
    pub start_time_ms: i64,
    /// Live status as of normalization. Use [`NormalizedMatch::live_at`] for a
    /// fresh reading.
    pub is_live: bool,
    pub is_popular: bool,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub sources: Vec<Source>,
}

impl NormalizedMatch {
    pub fn live_at(&self, now_ms: i64) -> bool {
        is_live_window(self.start_time_ms, now_ms)
    }

    /// Starts in the future, within the next hour.
    pub fn is_upcoming(&self, now_ms: i64) -> bool {
        self.start_time_ms > now_ms && self.start_time_ms - now_ms < UPCOMING_WINDOW_MS
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time_ms)
    }
}

/// One candidate stream for a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub raw_url: String,
    pub display_name: String,
}

/// Live iff the match started at or before `now` and less than
/// [`LIVE_WINDOW_MS`] ago.
pub fn is_live_window(start_ms: i64, now_ms: i64) -> bool {
    start_ms <= now_ms && now_ms.saturating_sub(start_ms) < LIVE_WINDOW_MS
}

/// UTC `YYYY-MM-DD` for a millisecond timestamp. Empty when out of range.
pub fn date_key(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
