use crate::state::messages::NetworkRequest;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Asks the network worker for a reload on a fixed interval. Stops once the
/// worker goes away.
pub struct PeriodicRefresher {
    network_requests: mpsc::Sender<NetworkRequest>,
    every: Duration,
}

impl PeriodicRefresher {
    pub fn new(network_requests: mpsc::Sender<NetworkRequest>, every: Duration) -> Self {
        Self { network_requests, every }
    }

    pub async fn run(self) {
        let mut ticks = interval(self.every);
        // Skip the immediate first tick so startup loading isn't double-triggered.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            debug!("periodic reload");
            if self.network_requests.send(NetworkRequest::LoadMatches).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sends_a_load_per_interval_after_the_first() {
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(PeriodicRefresher::new(tx, Duration::from_secs(300)).run());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(NetworkRequest::LoadMatches));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(rx.try_recv().ok(), Some(NetworkRequest::LoadMatches));
        assert!(rx.try_recv().is_err());

        drop(rx);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(task.await.is_ok());
    }
}
