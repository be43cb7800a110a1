pub mod app_settings;
pub mod app_state;
pub mod messages;
pub mod network;
pub mod refresher;

use crate::state::app_settings::AppSettings;
use crate::state::messages::{NetworkRequest, NetworkResponse};
use crate::state::network::NetworkWorker;
use crate::state::refresher::PeriodicRefresher;
use log::warn;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use yenitv_api::{Clock, FeedClient, Transport};

/// Channels and task handles for the background network side.
pub struct Workers {
    pub requests: mpsc::Sender<NetworkRequest>,
    pub responses: mpsc::Receiver<NetworkResponse>,
    network_task: JoinHandle<()>,
    refresher_task: JoinHandle<()>,
}

impl Workers {
    pub fn shutdown(self) {
        self.network_task.abort();
        self.refresher_task.abort();
    }
}

/// Spawn the network worker and the periodic refresher on the current tokio
/// runtime, and queue the initial load.
pub fn spawn_workers<T, C>(client: Arc<FeedClient<T, C>>, settings: &AppSettings) -> Workers
where
    T: Transport + 'static,
    C: Clock + 'static,
{
    let (network_req_tx, network_req_rx) = mpsc::channel::<NetworkRequest>(100);
    let (network_resp_tx, network_resp_rx) = mpsc::channel::<NetworkResponse>(100);

    let network_worker = NetworkWorker::new(client, settings.retry, network_req_rx, network_resp_tx);
    let network_task = tokio::spawn(network_worker.run());

    let refresher = PeriodicRefresher::new(network_req_tx.clone(), settings.refresh_interval);
    let refresher_task = tokio::spawn(refresher.run());

    if let Err(e) = network_req_tx.try_send(NetworkRequest::LoadMatches) {
        warn!("Failed to queue initial load: {e}");
    }

    Workers {
        requests: network_req_tx,
        responses: network_resp_rx,
        network_task,
        refresher_task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::App;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;
    use yenitv_api::{FeedConfig, FeedOrigin, FeedResult, ManualClock};

    const NOW: i64 = 1_760_000_000_000;

    struct StaticTransport;

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get_json(&self, _url: &str) -> FeedResult<Value> {
            Ok(json!({"events": {"2025-10-09": [
                {"unix_timestamp": NOW / 1000 + 3600, "sport": "Basketball", "tournament": "NBA",
                 "match": "Heat vs Knicks", "channels": ["https://x/channel/ESPN[USA]"]}
            ]}}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_reaches_the_app() {
        let client = Arc::new(FeedClient::with_parts(
            FeedConfig::default(),
            StaticTransport,
            ManualClock::new(NOW),
        ));
        let settings = AppSettings { refresh_interval: Duration::from_secs(60), ..Default::default() };
        let mut workers = spawn_workers(client, &settings);
        let mut app = App::with_settings(settings);

        while !matches!(app.state.origin, Some(FeedOrigin::Direct)) || app.state.loading.is_loading {
            let response = workers.responses.recv().await.expect("worker stopped early");
            app.handle_response(response);
        }
        assert_eq!(app.view(NOW).total(), 1);
        assert!(!app.needs_reload(NOW));

        // The refresher's first reload is served from the cache.
        let response = workers.responses.recv().await.expect("refresher stopped early");
        assert!(matches!(
            response,
            NetworkResponse::LoadingStateChanged { loading_state } if loading_state.is_loading
        ));
        workers.shutdown();
    }
}
