use crate::transport::{Clock, HttpTransport, SystemClock, Transport};
use crate::wire::parse_feed;
use crate::{RawEvent, RawFeed, date_key};
use log::{debug, warn};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub type FeedResult<T> = Result<T, FeedError>;

pub const DEFAULT_EVENTS_URL: &str = "https://topembed.pw/api.php?format=json";
pub const DEFAULT_MATCHES_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_PROXY_URL: &str = "https://api.allorigins.win/raw";
pub const CACHE_DURATION_MS: i64 = 5 * 60 * 1000;
const EVENTS_CACHE_KEY: &str = "events";
const DEFAULT_SPORTS: [&str; 6] = ["football", "basketball", "tennis", "baseball", "hockey", "soccer"];

#[derive(Debug)]
pub enum FeedError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(String, String),
    NotFound(String),
    Other(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            FeedError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            FeedError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            FeedError::NotFound(msg) => write!(f, "Not found: {msg}"),
            FeedError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Date-bucketed events feed. Takes no query parameters.
    pub events_url: String,
    /// Root of a `/{sport}/matches/{kind}` style backend.
    pub matches_base_url: String,
    /// CORS relay; the real URL is passed as its `url` query parameter.
    pub proxy_url: String,
    pub timeout: Duration,
    pub cache_duration_ms: i64,
    pub user_agent: String,
    /// Local JSON snapshot consulted before the network.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            events_url: DEFAULT_EVENTS_URL.into(),
            matches_base_url: DEFAULT_MATCHES_URL.into(),
            proxy_url: DEFAULT_PROXY_URL.into(),
            timeout: Duration::from_secs(10),
            cache_duration_ms: CACHE_DURATION_MS,
            user_agent: "yenitv/0.1 (live sports listings)".into(),
            snapshot_path: None,
        }
    }
}

impl FeedConfig {
    /// Defaults, overridden by `YENITV_FEED_URL`, `YENITV_MATCHES_URL`,
    /// `YENITV_PROXY_URL` and `YENITV_FEED_JSON` when set and non-blank.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(url) = var("YENITV_FEED_URL") {
            config.events_url = url;
        }
        if let Some(url) = var("YENITV_MATCHES_URL") {
            config.matches_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = var("YENITV_PROXY_URL") {
            config.proxy_url = url;
        }
        config.snapshot_path = var("YENITV_FEED_JSON").map(PathBuf::from);
        config
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchKind {
    #[default]
    All,
    Live,
    Today,
    TopToday,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::All => "all",
            MatchKind::Live => "live",
            MatchKind::Today => "today",
            MatchKind::TopToday => "top-today",
        }
    }

    fn path_suffix(&self) -> &'static str {
        match self {
            MatchKind::All => "",
            MatchKind::Live => "/live",
            MatchKind::Today => "/today",
            MatchKind::TopToday => "/top-today",
        }
    }
}

/// A logical request against the upstream. Equal requests share a cache slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FeedRequest {
    #[default]
    Events,
    Matches { sport: Option<String>, kind: MatchKind },
}

impl FeedRequest {
    pub fn cache_key(&self) -> String {
        match self {
            FeedRequest::Events => EVENTS_CACHE_KEY.to_owned(),
            FeedRequest::Matches { sport, kind } => {
                let sport = sport_segment(sport.as_deref()).unwrap_or("all");
                format!("matches-{sport}-{}", kind.as_str())
            }
        }
    }

    pub fn url(&self, config: &FeedConfig) -> String {
        match self {
            FeedRequest::Events => config.events_url.clone(),
            FeedRequest::Matches { sport, kind } => {
                let base = config.matches_base_url.trim_end_matches('/');
                match sport_segment(sport.as_deref()) {
                    Some(sport) => format!("{base}/{sport}/matches{}", kind.path_suffix()),
                    None => format!("{base}/matches{}", kind.path_suffix()),
                }
            }
        }
    }
}

/// `"All"` and blank sports mean "no sport segment".
fn sport_segment(sport: Option<&str>) -> Option<&str> {
    sport.map(str::trim).filter(|s| !s.is_empty() && *s != "All")
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub feed: RawFeed,
    pub stored_at_ms: i64,
}

/// Whether an entry stored at `stored_at_ms` is still servable at `now_ms`.
pub fn is_fresh(stored_at_ms: i64, now_ms: i64, duration_ms: i64) -> bool {
    now_ms.saturating_sub(stored_at_ms) < duration_ms
}

/// Time-boxed feed cache. All reads take an explicit `now`.
#[derive(Debug, Clone)]
pub struct FeedCache {
    entries: HashMap<String, CacheEntry>,
    duration_ms: i64,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(CACHE_DURATION_MS)
    }
}

impl FeedCache {
    pub fn new(duration_ms: i64) -> Self {
        Self { entries: HashMap::new(), duration_ms }
    }

    /// The cached feed for `key`, unless missing or expired.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<&RawFeed> {
        self.entries
            .get(key)
            .filter(|entry| is_fresh(entry.stored_at_ms, now_ms, self.duration_ms))
            .map(|entry| &entry.feed)
    }

    pub fn set(&mut self, key: impl Into<String>, feed: RawFeed, now_ms: i64) {
        self.entries.insert(key.into(), CacheEntry { feed, stored_at_ms: now_ms });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Where a fetched feed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Cache,
    Snapshot,
    Direct,
    Proxy,
    Sample,
}

impl FeedOrigin {
    /// True when every upstream attempt failed and the built-in sample was served.
    pub fn is_fallback(&self) -> bool {
        matches!(self, FeedOrigin::Sample)
    }
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub feed: RawFeed,
    pub origin: FeedOrigin,
}

/// Sports feed client with a time-boxed cache.
///
/// Fallback chain for a cache miss:
/// 1) `snapshot_path`: local feed JSON, when configured.
/// 2) Direct GET against the upstream.
/// 3) The same GET routed through the CORS relay.
/// 4) A built-in sample feed relative to the current clock. Never fails.
///
/// Only results from 2) and 3) are cached.
pub struct FeedClient<T = HttpTransport, C = SystemClock> {
    config: FeedConfig,
    transport: T,
    clock: C,
    cache: Mutex<FeedCache>,
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::with_config(FeedConfig::from_env())
    }
}

impl FeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeedConfig) -> Self {
        let transport = HttpTransport::new(&config.user_agent, config.timeout);
        Self::with_parts(config, transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> FeedClient<T, C> {
    pub fn with_parts(config: FeedConfig, transport: T, clock: C) -> Self {
        let cache = Mutex::new(FeedCache::new(config.cache_duration_ms));
        Self { config, transport, clock, cache }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Fetch the date-bucketed events feed.
    pub async fn fetch_events(&self) -> RawFeed {
        self.fetch(&FeedRequest::Events).await
    }

    pub async fn fetch(&self, request: &FeedRequest) -> RawFeed {
        self.fetch_with_origin(request).await.feed
    }

    pub async fn fetch_with_origin(&self, request: &FeedRequest) -> Fetched {
        let key = request.cache_key();

        if let Some(feed) = self.cache().get(&key, self.clock.now_ms()).cloned() {
            debug!("serving {key} from cache");
            return Fetched { feed, origin: FeedOrigin::Cache };
        }

        if let Some(path) = &self.config.snapshot_path {
            match self.load_snapshot(path) {
                Ok(feed) => return Fetched { feed, origin: FeedOrigin::Snapshot },
                Err(e) => warn!("snapshot unavailable, trying network: {e}"),
            }
        }

        let url = request.url(&self.config);
        match self.request(&url).await {
            Ok(feed) => return self.store(key, feed, FeedOrigin::Direct),
            Err(e) => warn!("direct fetch failed, trying proxy: {e}"),
        }

        let proxied = match proxied_url(&self.config.proxy_url, &url) {
            Ok(proxied) => self.request(&proxied).await,
            Err(e) => Err(e),
        };
        match proxied {
            Ok(feed) => return self.store(key, feed, FeedOrigin::Proxy),
            Err(e) => warn!("proxy fetch failed, using sample data: {e}"),
        }

        Fetched { feed: sample_feed(self.clock.now_ms()), origin: FeedOrigin::Sample }
    }

    /// Sport names the backend knows about, or a built-in list when it can't
    /// be reached.
    pub async fn fetch_sports(&self) -> Vec<String> {
        let url = format!("{}/sports", self.config.matches_base_url.trim_end_matches('/'));
        let sports = self
            .transport
            .get_json(&url)
            .await
            .and_then(|value| {
                serde_json::from_value::<Vec<String>>(value)
                    .map_err(|e| FeedError::Parsing(e.to_string(), url.clone()))
            });
        match sports {
            Ok(sports) if !sports.is_empty() => sports,
            Ok(_) => default_sports(),
            Err(e) => {
                warn!("failed to fetch sports, using defaults: {e}");
                default_sports()
            }
        }
    }

    /// Drop every cached feed so the next fetch goes to the upstream.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    async fn request(&self, url: &str) -> FeedResult<RawFeed> {
        let value = self.transport.get_json(url).await?;
        parse_feed(value, url)
    }

    fn store(&self, key: String, feed: RawFeed, origin: FeedOrigin) -> Fetched {
        debug!("fetched {} events for {key} via {origin:?}", feed.event_count());
        self.cache().set(key, feed.clone(), self.clock.now_ms());
        Fetched { feed, origin }
    }

    fn load_snapshot(&self, path: &Path) -> FeedResult<RawFeed> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FeedError::NotFound(format!("could not read {display}: {e}")))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| FeedError::Parsing(e.to_string(), display.clone()))?;
        parse_feed(value, &display)
    }

    fn cache(&self) -> MutexGuard<'_, FeedCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Route `target` through the relay, percent-encoded as its `url` parameter.
pub fn proxied_url(proxy: &str, target: &str) -> FeedResult<String> {
    Url::parse_with_params(proxy, &[("url", target)])
        .map(String::from)
        .map_err(|e| FeedError::Other(format!("invalid proxy url {proxy}: {e}")))
}

fn default_sports() -> Vec<String> {
    DEFAULT_SPORTS.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Sample feed, served when the upstream is unreachable
// ---------------------------------------------------------------------------

/// A small feed anchored to `now_ms`: one match in progress, one later today,
/// one tomorrow. Always spans at least two dates.
pub fn sample_feed(now_ms: i64) -> RawFeed {
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;

    let samples = [
        (
            now_ms - 30 * MINUTE,
            "Football",
            "NFL",
            "Kansas City Chiefs vs Buffalo Bills",
            vec![
                "https://topembed.pw/channel/ExtraSports[USA]",
                "https://topembed.pw/channel/TSN1[CAN]",
            ],
        ),
        (
            now_ms + 2 * HOUR,
            "Basketball",
            "NBA",
            "Los Angeles Lakers vs Boston Celtics",
            vec!["https://topembed.pw/channel/ESPN[USA]"],
        ),
        (
            now_ms + 25 * HOUR,
            "Tennis",
            "ATP US Open",
            "Novak Djokovic vs Carlos Alcaraz",
            vec!["https://topembed.pw/channel/TennisChannel"],
        ),
    ];

    let mut feed = RawFeed::new();
    for (start_ms, sport, tournament, title, channels) in samples {
        let unix_timestamp = start_ms.div_euclid(1000);
        feed.push(
            date_key(unix_timestamp * 1000),
            RawEvent {
                unix_timestamp,
                sport: sport.into(),
                tournament: tournament.into(),
                title: title.into(),
                channels: channels.into_iter().map(String::from).collect(),
                ..Default::default()
            },
        );
    }
    feed
}
