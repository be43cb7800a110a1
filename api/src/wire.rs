use crate::client::{FeedError, FeedResult};
use crate::{RawEvent, RawFeed, date_key};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Bucketed events  (`{"events": {"2025-10-09": [...]}}`)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct EventsResponse {
    /// Events are kept as raw values so one bad record can't sink its bucket.
    pub events: Option<BTreeMap<String, Vec<Value>>>,
}

// ---------------------------------------------------------------------------
// Flat matches  (`[...]` or `{"matches": [...]}`)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatch {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub category: String,
    /// Unix milliseconds.
    pub date: i64,
    #[serde(default)]
    pub popular: bool,
    pub teams: Option<ApiTeams>,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub sources: Vec<ApiSource>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiTeams {
    pub home: Option<ApiTeam>,
    pub away: Option<ApiTeam>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiTeam {
    pub name: String,
    #[serde(default)]
    pub badge: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiSource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub embed: String,
}

impl From<ApiMatch> for RawEvent {
    fn from(m: ApiMatch) -> Self {
        let (channels, channel_names) = m
            .sources
            .into_iter()
            .map(|s| (s.embed, Some(s.name).filter(|n| !n.trim().is_empty())))
            .unzip();
        let teams = m.teams.unwrap_or_default();
        RawEvent {
            unix_timestamp: m.date.div_euclid(1000),
            sport: m.category,
            tournament: m.league,
            title: m.title,
            channels,
            channel_names,
            home_team: teams.home.map(|t| t.name),
            away_team: teams.away.map(|t| t.name),
            popular: m.popular,
        }
    }
}

// ---------------------------------------------------------------------------
// Shape detection
// ---------------------------------------------------------------------------

/// A decoded upstream payload, tagged by the shape it arrived in: date-bucketed
/// events, or a flat match list from a `/{sport}/matches/{kind}` backend.
#[derive(Debug, Clone)]
pub enum FeedPayload {
    Events(BTreeMap<String, Vec<Value>>),
    Matches(Vec<Value>),
}

impl FeedPayload {
    /// Classify a JSON document. Objects carrying neither `events` nor
    /// `matches` decode as an empty event map; scalars are rejected.
    pub fn from_value(value: Value, url: &str) -> FeedResult<Self> {
        match value {
            Value::Array(items) => Ok(FeedPayload::Matches(items)),
            Value::Object(mut map) => {
                if let Some(Value::Array(items)) = map.remove("matches") {
                    return Ok(FeedPayload::Matches(items));
                }
                let raw: EventsResponse = serde_json::from_value(Value::Object(map))
                    .map_err(|e| FeedError::Parsing(e.to_string(), url.to_owned()))?;
                Ok(FeedPayload::Events(raw.events.unwrap_or_default()))
            }
            other => Err(FeedError::Parsing(
                format!("expected an object or array, got {}", json_kind(&other)),
                url.to_owned(),
            )),
        }
    }

    /// Adapt into the canonical feed, dropping records that don't decode.
    pub fn into_feed(self) -> RawFeed {
        let mut feed = RawFeed::new();
        match self {
            FeedPayload::Events(days) => {
                for (date, events) in days {
                    let bucket = feed.days.entry(date.clone()).or_default();
                    for value in events {
                        match serde_json::from_value::<RawEvent>(value) {
                            Ok(event) => bucket.push(event),
                            Err(e) => warn!("skipping malformed event on {date}: {e}"),
                        }
                    }
                }
            }
            FeedPayload::Matches(items) => {
                for value in items {
                    match serde_json::from_value::<ApiMatch>(value) {
                        Ok(m) => {
                            let date = date_key(m.date);
                            feed.push(date, m.into());
                        }
                        Err(e) => warn!("skipping malformed match: {e}"),
                    }
                }
            }
        }
        feed
    }
}

/// Decode any supported payload straight into the canonical feed.
pub fn parse_feed(value: Value, url: &str) -> FeedResult<RawFeed> {
    FeedPayload::from_value(value, url).map(FeedPayload::into_feed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucketed_events_keep_their_date_keys() {
        let value = json!({
            "events": {
                "2025-10-10": [
                    {"unix_timestamp": 1760090000, "sport": "Soccer", "tournament": "EPL",
                     "match": "Arsenal - Chelsea", "channels": ["https://x/channel/Sky[UK]"]}
                ],
                "2025-10-09": [
                    {"unix_timestamp": 1760000000, "sport": "Football", "tournament": "NFL",
                     "match": "Chiefs vs Bills", "channels": []}
                ]
            }
        });
        let feed = parse_feed(value, "test").unwrap();
        assert_eq!(feed.dates().collect::<Vec<_>>(), vec!["2025-10-09", "2025-10-10"]);
        assert_eq!(feed.days["2025-10-10"][0].title, "Arsenal - Chelsea");
    }

    #[test]
    fn missing_events_mapping_is_an_empty_feed() {
        let feed = parse_feed(json!({"status": "ok"}), "test").unwrap();
        assert!(feed.is_empty());
    }

    #[test]
    fn malformed_event_is_skipped_not_fatal() {
        let value = json!({
            "events": {
                "2025-10-09": [
                    {"sport": "Football"},
                    {"unix_timestamp": 1760000000, "match": "Good one"}
                ]
            }
        });
        let feed = parse_feed(value, "test").unwrap();
        assert_eq!(feed.event_count(), 1);
        assert_eq!(feed.days["2025-10-09"][0].title, "Good one");
    }

    #[test]
    fn flat_match_array_is_bucketed_by_utc_date() {
        let value = json!([
            {
                "id": "2", "title": "Los Angeles Lakers vs Boston Celtics",
                "category": "basketball", "date": 1760000000123i64, "league": "NBA",
                "teams": {"home": {"name": "Los Angeles Lakers"}, "away": {"name": "Boston Celtics"}},
                "sources": [{"id": "3", "name": "Stream 3", "embed": "https://example.com/stream3"}]
            }
        ]);
        let feed = parse_feed(value, "test").unwrap();
        let event = &feed.days["2025-10-09"][0];
        assert_eq!(event.unix_timestamp, 1_760_000_000);
        assert_eq!(event.sport, "basketball");
        assert_eq!(event.tournament, "NBA");
        assert_eq!(event.channels, vec!["https://example.com/stream3".to_string()]);
    }

    #[test]
    fn flat_match_keeps_source_names_and_teams() {
        let value = json!({"matches": [{
            "title": "Heat at Knicks", "category": "basketball", "date": 1760000000000i64,
            "popular": true,
            "teams": {"home": {"name": "Miami Heat"}, "away": {"name": "New York Knicks"}},
            "sources": [
                {"name": "TSN 4", "embed": "https://cdn.test/e/1"},
                {"name": "ExtraHD", "embed": "https://cdn.test/e/2"},
                {"name": " ", "embed": "https://cdn.test/channel/Sky[UK]"}
            ]
        }]});
        let feed = parse_feed(value, "test").unwrap();
        let m = &crate::normalize(&feed, 1_760_000_000_000)[0];

        let names: Vec<&str> = m.sources.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, vec!["TSN 4", "ExtraHD", "Sky"]);
        assert_eq!(m.home_team.as_deref(), Some("Miami Heat"));
        assert_eq!(m.away_team.as_deref(), Some("New York Knicks"));
        assert_eq!(m.sport_category, "basketball");
        assert!(m.is_popular);
    }

    #[test]
    fn matches_wrapper_object_is_accepted() {
        let value = json!({"matches": [{"title": "A vs B", "date": 1760000000000i64}]});
        match FeedPayload::from_value(value, "test").unwrap() {
            FeedPayload::Matches(items) => assert_eq!(items.len(), 1),
            other => panic!("expected flat matches, got {other:?}"),
        }
    }

    #[test]
    fn scalar_payload_is_a_parse_error() {
        let err = parse_feed(json!("<html>rate limited</html>"), "https://feed").unwrap_err();
        assert!(matches!(err, FeedError::Parsing(_, ref url) if url == "https://feed"));
    }

    #[test]
    fn non_map_events_field_is_a_parse_error() {
        assert!(parse_feed(json!({"events": []}), "test").is_err());
    }
}
