use crate::state::app_settings::RetryPolicy;
use crate::state::messages::{NetworkRequest, NetworkResponse};
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use yenitv_api::{Clock, FeedClient, FeedRequest, Fetched, Transport, normalize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub is_loading: bool,
    /// Set while a user-triggered refresh is in flight.
    pub is_refreshing: bool,
}

/// Serves [`NetworkRequest`]s one at a time: fetch (with retry), normalize,
/// and hand the full match collection back.
pub struct NetworkWorker<T, C> {
    client: Arc<FeedClient<T, C>>,
    feed_request: FeedRequest,
    retry: RetryPolicy,
    requests: mpsc::Receiver<NetworkRequest>,
    responses: mpsc::Sender<NetworkResponse>,
}

impl<T: Transport, C: Clock> NetworkWorker<T, C> {
    pub fn new(
        client: Arc<FeedClient<T, C>>,
        retry: RetryPolicy,
        requests: mpsc::Receiver<NetworkRequest>,
        responses: mpsc::Sender<NetworkResponse>,
    ) -> Self {
        Self {
            client,
            feed_request: FeedRequest::Events,
            retry,
            requests,
            responses,
        }
    }

    /// Point the worker at a different upstream request (e.g. a per-sport
    /// match list).
    pub fn with_feed_request(mut self, feed_request: FeedRequest) -> Self {
        self.feed_request = feed_request;
        self
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            let refreshing = request == NetworkRequest::Refresh;
            let loading_state = LoadingState { is_loading: true, is_refreshing: refreshing };
            if !self.send(NetworkResponse::LoadingStateChanged { loading_state }).await {
                break;
            }

            if refreshing {
                self.client.clear_cache();
            }

            let fetched = self.fetch_with_retry().await;
            let fetched_at_ms = self.client.now_ms();
            let matches = normalize(&fetched.feed, fetched_at_ms);
            debug!("network request complete: {} matches via {:?}", matches.len(), fetched.origin);

            let mut responses = vec![NetworkResponse::MatchesLoaded {
                matches,
                fetched_at_ms,
                origin: fetched.origin,
            }];
            if refreshing {
                responses.push(NetworkResponse::RefreshFinished { ok: !fetched.origin.is_fallback() });
            }
            responses.push(NetworkResponse::LoadingStateChanged { loading_state: LoadingState::default() });

            for response in responses {
                if !self.send(response).await {
                    return;
                }
            }
        }
    }

    /// Re-fetch while the client keeps falling back to its sample feed, up to
    /// the retry budget. The last result is returned either way.
    async fn fetch_with_retry(&self) -> Fetched {
        let mut attempt = 0;
        loop {
            let fetched = self.client.fetch_with_origin(&self.feed_request).await;
            attempt += 1;
            if !fetched.origin.is_fallback() || attempt >= self.retry.max_attempts {
                return fetched;
            }
            let delay = self.retry.delay_for(attempt - 1);
            warn!("upstream unavailable (attempt {attempt}), retrying in {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(&self, response: NetworkResponse) -> bool {
        match self.responses.send(response).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send network response: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use yenitv_api::{FeedConfig, FeedError, FeedOrigin, FeedResult, ManualClock};

    const NOW: i64 = 1_760_000_000_000;

    /// Answers the direct events URL from a queue of outcomes; everything else
    /// (including the relay) fails.
    #[derive(Default)]
    struct ScriptedTransport {
        direct: Mutex<VecDeque<Option<Value>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn with(outcomes: Vec<Option<Value>>) -> Arc<Self> {
            Arc::new(Self { direct: Mutex::new(outcomes.into()), calls: Mutex::new(0) })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get_json(&self, url: &str) -> FeedResult<Value> {
            *self.calls.lock().unwrap() += 1;
            if url != "https://feed.test/events" {
                return Err(FeedError::Other("relay down".into()));
            }
            self.direct
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or_else(|| FeedError::Other("upstream down".into()))
        }
    }

    fn feed() -> Value {
        json!({"events": {"2025-10-09": [
            {"unix_timestamp": NOW / 1000 - 600, "sport": "Soccer", "tournament": "EPL",
             "match": "Arsenal - Chelsea", "channels": ["https://x/channel/Sky[UK]"]}
        ]}})
    }

    fn worker(
        transport: Arc<ScriptedTransport>,
    ) -> (mpsc::Sender<NetworkRequest>, mpsc::Receiver<NetworkResponse>) {
        let config = FeedConfig {
            events_url: "https://feed.test/events".into(),
            proxy_url: "https://relay.test/raw".into(),
            ..Default::default()
        };
        let client = Arc::new(FeedClient::with_parts(config, transport, ManualClock::new(NOW)));
        let (req_tx, req_rx) = mpsc::channel(8);
        let (resp_tx, resp_rx) = mpsc::channel(8);
        tokio::spawn(NetworkWorker::new(client, RetryPolicy::default(), req_rx, resp_tx).run());
        (req_tx, resp_rx)
    }

    async fn collect_until_idle(rx: &mut mpsc::Receiver<NetworkResponse>) -> Vec<NetworkResponse> {
        let mut out = Vec::new();
        while let Some(response) = rx.recv().await {
            let done = matches!(
                response,
                NetworkResponse::LoadingStateChanged { loading_state } if !loading_state.is_loading
            );
            out.push(response);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn load_emits_matches_between_loading_states() {
        let transport = ScriptedTransport::with(vec![Some(feed())]);
        let (tx, mut rx) = worker(transport.clone());

        tx.send(NetworkRequest::LoadMatches).await.unwrap();
        let responses = collect_until_idle(&mut rx).await;

        assert_eq!(responses.len(), 3);
        assert!(matches!(
            responses[0],
            NetworkResponse::LoadingStateChanged { loading_state: LoadingState { is_loading: true, is_refreshing: false } }
        ));
        match &responses[1] {
            NetworkResponse::MatchesLoaded { matches, fetched_at_ms, origin } => {
                assert_eq!(matches.len(), 1);
                assert!(matches[0].is_live);
                assert_eq!(*fetched_at_ms, NOW);
                assert_eq!(*origin, FeedOrigin::Direct);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_until_upstream_recovers() {
        let transport = ScriptedTransport::with(vec![None, None, Some(feed())]);
        let (tx, mut rx) = worker(transport.clone());

        let started = tokio::time::Instant::now();
        tx.send(NetworkRequest::LoadMatches).await.unwrap();
        let responses = collect_until_idle(&mut rx).await;

        assert!(responses.iter().any(|r| matches!(
            r,
            NetworkResponse::MatchesLoaded { origin: FeedOrigin::Direct, .. }
        )));
        // Two failed rounds of direct + relay, then a direct success.
        assert_eq!(transport.calls(), 5);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget_and_serves_sample() {
        let transport = ScriptedTransport::with(vec![]);
        let (tx, mut rx) = worker(transport.clone());

        tx.send(NetworkRequest::Refresh).await.unwrap();
        let responses = collect_until_idle(&mut rx).await;

        assert!(responses.iter().any(|r| matches!(
            r,
            NetworkResponse::MatchesLoaded { origin: FeedOrigin::Sample, matches, .. } if !matches.is_empty()
        )));
        assert!(responses.iter().any(|r| matches!(r, NetworkResponse::RefreshFinished { ok: false })));
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_bypasses_cache_and_reports_success() {
        let transport = ScriptedTransport::with(vec![Some(feed()), Some(feed())]);
        let (tx, mut rx) = worker(transport.clone());

        tx.send(NetworkRequest::LoadMatches).await.unwrap();
        collect_until_idle(&mut rx).await;
        tx.send(NetworkRequest::LoadMatches).await.unwrap();
        collect_until_idle(&mut rx).await;
        assert_eq!(transport.calls(), 1, "second load should hit the cache");

        tx.send(NetworkRequest::Refresh).await.unwrap();
        let responses = collect_until_idle(&mut rx).await;
        assert!(matches!(
            responses[0],
            NetworkResponse::LoadingStateChanged { loading_state: LoadingState { is_refreshing: true, .. } }
        ));
        assert!(responses.iter().any(|r| matches!(r, NetworkResponse::RefreshFinished { ok: true })));
        assert_eq!(transport.calls(), 2);
    }
}
