use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::query::PageRequest;
use crate::clients::FeedClient;
use crate::error::FeedError;
use crate::gateway::QueryGateway;

/// Periodic pull of the current page.
///
/// Pulls on every tick of `interval` (the first one immediately), whenever the
/// presenter changes the page or search, and whenever someone calls
/// `notify_one` on the refresh handle. Each successful pull reseeds the feed;
/// failures are recorded on the feed and the last good list stays.
pub struct FeedPoller {
    gateway: Arc<dyn QueryGateway>,
    feed: FeedClient,
    query: watch::Receiver<PageRequest>,
    refresh: Arc<Notify>,
    interval: Duration,
    token: CancellationToken,
}

impl FeedPoller {
    pub fn new(
        gateway: Arc<dyn QueryGateway>,
        feed: FeedClient,
        query: watch::Receiver<PageRequest>,
        refresh: Arc<Notify>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            feed,
            query,
            refresh,
            interval,
            token,
        }
    }

    #[instrument(name = "feed_poller", skip(self), fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run(mut self) {
        info!("FeedPoller starting");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                changed = self.query.changed() => {
                    if changed.is_err() {
                        info!("Query source dropped");
                        break;
                    }
                    debug!("Query changed, pulling now");
                    ticker.reset();
                }
                _ = self.refresh.notified() => {
                    debug!("Refresh requested, pulling now");
                    ticker.reset();
                }
                _ = ticker.tick() => {}
            }

            let request = self.query.borrow_and_update().clone();
            if let Err(FeedError::ActorCommunicationError(e)) = self.pull_once(&request).await {
                warn!(error = %e, "Feed service gone, stopping poller");
                break;
            }
        }

        info!("FeedPoller stopped");
    }

    #[instrument(fields(page = request.page, search = ?request.search_term), skip(self, request))]
    async fn pull_once(&self, request: &PageRequest) -> Result<(), FeedError> {
        let start = Instant::now();
        match self.gateway.fetch_orders(request).await {
            Ok(page) => {
                let received = page.items.len();
                let view = self.feed.seed(page).await?;
                debug!(
                    received,
                    revision = view.revision,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Orders pulled"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, duration_ms = start.elapsed().as_millis() as u64, "Order pull failed");
                self.feed.record_failure(e.to_string()).await
            }
        }
    }
}
