use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::clients::FeedClient;
use crate::domain::FeedEvent;
use crate::error::{FeedError, TransportError};
use crate::gateway::PushChannel;

/// A live push subscription feeding the order feed.
///
/// Cancelling is idempotent and also happens on drop. Pending events are
/// discarded, not drained.
#[derive(Debug)]
pub struct FeedSubscription {
    scope: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    #[instrument(skip(channel, feed))]
    pub async fn start(channel: &dyn PushChannel, scope: &str, feed: FeedClient) -> Result<Self, TransportError> {
        let events = channel.subscribe(scope).await?;
        info!("Subscribed to order events");

        let token = CancellationToken::new();
        let span = tracing::info_span!("feed_subscription", scope);
        let handle = tokio::spawn(pump(events, feed, token.clone()).instrument(span));

        Ok(Self {
            scope: scope.to_string(),
            token,
            handle: Some(handle),
        })
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(scope = %self.scope, "Cancelling order subscription");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels and waits for the pump task to exit.
    pub async fn close(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = ?e, "Subscription task failed");
            }
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Forwards events in delivery order until cancelled, the channel ends or the
/// feed service goes away. A malformed payload is logged and skipped.
async fn pump(mut events: mpsc::Receiver<Value>, feed: FeedClient, token: CancellationToken) {
    loop {
        let raw = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Subscription cancelled");
                break;
            }
            raw = events.recv() => match raw {
                Some(raw) => raw,
                None => {
                    info!("Push channel closed");
                    break;
                }
            },
        };

        let event = match FeedEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed feed event");
                continue;
            }
        };

        match feed.apply_event(event).await {
            Ok(outcome) => debug!(?outcome, "Event merged"),
            Err(FeedError::ActorCommunicationError(e)) => {
                warn!(error = %e, "Feed service gone, stopping subscription");
                break;
            }
            Err(e) => warn!(error = %e, "Event not applied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures::order;
    use crate::domain::OrderStatus;
    use crate::gateway::InMemoryBackend;
    use crate::mock_framework::{create_mock_feed_client, expect_apply_event};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_events_in_order_and_skips_malformed() {
        let backend = InMemoryBackend::new();
        let (feed, mut rx) = create_mock_feed_client(10);
        let subscription = FeedSubscription::start(&backend, "rest_1", feed).await.unwrap();

        backend.place_order(order("o1", OrderStatus::Pending));
        backend.push_raw("rest_1", json!({"origin": "new", "order": {"orderId": "no id"}}));
        backend.update_order(order("o1", OrderStatus::Accepted));

        let (event, responder) = expect_apply_event(&mut rx).await.expect("Expected first event");
        assert_eq!(event, FeedEvent::New(order("o1", OrderStatus::Pending)));
        responder.send(Ok(crate::feed::MergeOutcome::Prepended)).unwrap();

        let (event, responder) = expect_apply_event(&mut rx).await.expect("Expected second event");
        assert_eq!(event, FeedEvent::Update(order("o1", OrderStatus::Accepted)));
        responder.send(Ok(crate::feed::MergeOutcome::Replaced { index: 0 })).unwrap();

        subscription.close().await;
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_delivery() {
        let backend = InMemoryBackend::new();
        let (feed, mut rx) = create_mock_feed_client(10);
        let subscription = FeedSubscription::start(&backend, "rest_1", feed).await.unwrap();

        subscription.cancel();
        subscription.cancel();
        assert!(subscription.is_cancelled());
        subscription.close().await;

        backend.place_order(order("o1", OrderStatus::Pending));
        let next = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(next, Ok(None)), "no event after cancel");
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_without_cancel_stops_pump() {
        let backend = InMemoryBackend::new();
        let (feed, mut rx) = create_mock_feed_client(10);
        let subscription = FeedSubscription::start(&backend, "rest_1", feed).await.unwrap();
        drop(subscription);

        // The pump owned the only feed client; once it exits the mailbox closes.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }
}
