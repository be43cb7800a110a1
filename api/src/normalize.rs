use crate::{NormalizedMatch, POPULAR_SPORTS, RawEvent, RawFeed, Source, is_live_window};

const CHANNEL_MARKER: &str = "/channel/";
const DEFAULT_SOURCE_NAME: &str = "Stream";
/// Checked in order; the first separator found splits home from away.
const TEAM_SEPARATORS: [&str; 4] = [" vs. ", " vs ", " v ", " - "];

/// Flatten every date bucket into normalized matches. Pure: the same feed and
/// `now` give the same output. Order follows bucket iteration and is not
/// meaningful; sort downstream.
pub fn normalize(feed: &RawFeed, now_ms: i64) -> Vec<NormalizedMatch> {
    feed.days
        .iter()
        .flat_map(|(date, events)| {
            events
                .iter()
                .enumerate()
                .map(move |(idx, event)| normalize_event(date, idx, event, now_ms))
        })
        .collect()
}

pub fn normalize_event(date: &str, idx: usize, event: &RawEvent, now_ms: i64) -> NormalizedMatch {
    let start_time_ms = event.unix_timestamp.saturating_mul(1000);
    let sport_category = normalize_category(&event.sport);
    let (home_team, away_team) = match (&event.home_team, &event.away_team) {
        (None, None) => split_teams(&event.title),
        (home, away) => (home.clone(), away.clone()),
    };

    let sources = event
        .channels
        .iter()
        .enumerate()
        .map(|(i, url)| Source {
            id: format!("{}-{i}", event.title),
            raw_url: url.clone(),
            display_name: event
                .channel_names
                .get(i)
                .and_then(|name| name.as_deref())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map_or_else(|| extract_channel_name(url), str::to_owned),
        })
        .collect();

    NormalizedMatch {
        id: format!("{date}-{idx}"),
        slug: slug(&event.title),
        title: event.title.clone(),
        is_popular: event.popular || is_popular(&sport_category),
        sport_category,
        tournament: event.tournament.clone(),
        date_key: date.to_owned(),
        start_time_ms,
        is_live: is_live_window(start_time_ms, now_ms),
        home_team,
        away_team,
        sources,
    }
}

pub fn is_popular(category: &str) -> bool {
    POPULAR_SPORTS.contains(&category)
}

/// The category as upstream sent it, surrounding whitespace removed. Case is
/// kept: filters and the popular check compare it exactly.
pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_owned()
}

/// Channel name from a `/channel/<name>` URL segment, with bracketed tags such
/// as `[USA]` removed. Falls back to `"Stream"`.
pub fn extract_channel_name(url: &str) -> String {
    let Some(start) = url.find(CHANNEL_MARKER) else {
        return DEFAULT_SOURCE_NAME.to_owned();
    };
    let segment = url[start + CHANNEL_MARKER.len()..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    let name = strip_bracketed(segment);
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_SOURCE_NAME.to_owned()
    } else {
        name.to_owned()
    }
}

fn strip_bracketed(s: &str) -> String {
    let mut depth = 0usize;
    s.chars()
        .filter(|&c| match c {
            '[' => {
                depth += 1;
                false
            }
            ']' if depth > 0 => {
                depth -= 1;
                false
            }
            _ => depth == 0,
        })
        .collect()
}

/// Lowercase, keep `[a-z0-9]`, whitespace and hyphens, then join whitespace
/// runs with single hyphens.
pub fn slug(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Home and away names from titles like `"Home vs Away"` or `"Home - Away"`.
pub fn split_teams(title: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| Some(s.trim().to_owned()).filter(|s| !s.is_empty());
    TEAM_SEPARATORS
        .iter()
        .find_map(|sep| title.split_once(sep))
        .map(|(home, away)| (non_empty(home), non_empty(away)))
        .unwrap_or((None, None))
}
