//! # Mock Framework
//!
//! Utilities for testing code that talks to the feed service without
//! spinning up a real [`FeedService`](crate::feed::FeedService).
//!
//! Use [`create_mock_feed_client`] to get a client and a receiver, then use
//! helpers like [`expect_apply_event`] or [`expect_get_order`] to assert on
//! the requests and answer them.

use tokio::sync::{mpsc, oneshot, watch};

use crate::clients::FeedClient;
use crate::domain::{FeedEvent, Order, OrderId};
use crate::error::FeedError;
use crate::feed::{FeedView, MergeOutcome, OrderPage};
use crate::messages::FeedRequest;

/// Creates a mock client and a receiver for asserting requests.
///
/// The client's view channel is fed by a sender that is dropped right away,
/// so [`FeedClient::latest`] returns the default view.
pub fn create_mock_feed_client(buffer_size: usize) -> (FeedClient, mpsc::Receiver<FeedRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    let (_view_tx, view_rx) = watch::channel(FeedView::default());
    (FeedClient::new(sender, view_rx), receiver)
}

/// Helper to verify that the next message is an ApplyEvent request
pub async fn expect_apply_event(
    receiver: &mut mpsc::Receiver<FeedRequest>,
) -> Option<(FeedEvent, oneshot::Sender<Result<MergeOutcome, FeedError>>)> {
    match receiver.recv().await {
        Some(FeedRequest::ApplyEvent { event, respond_to }) => Some((event, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a GetOrder request
pub async fn expect_get_order(
    receiver: &mut mpsc::Receiver<FeedRequest>,
) -> Option<(OrderId, oneshot::Sender<Result<Option<Order>, FeedError>>)> {
    match receiver.recv().await {
        Some(FeedRequest::GetOrder { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Seed request
pub async fn expect_seed(
    receiver: &mut mpsc::Receiver<FeedRequest>,
) -> Option<(OrderPage, oneshot::Sender<Result<FeedView, FeedError>>)> {
    match receiver.recv().await {
        Some(FeedRequest::Seed { page, respond_to }) => Some((page, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a RecordFailure request
pub async fn expect_record_failure(
    receiver: &mut mpsc::Receiver<FeedRequest>,
) -> Option<(String, oneshot::Sender<Result<(), FeedError>>)> {
    match receiver.recv().await {
        Some(FeedRequest::RecordFailure { message, respond_to }) => Some((message, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures::order;
    use crate::domain::OrderStatus;

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_feed_client(10);

        let get_task = tokio::spawn(async move { client.get_order("o1".to_string()).await });

        let (id, responder) = expect_get_order(&mut receiver).await.expect("Expected GetOrder request");
        assert_eq!(id, "o1");
        responder.send(Ok(Some(order("o1", OrderStatus::Pending)))).unwrap();

        let result = get_task.await.unwrap();
        assert_eq!(result.unwrap().map(|o| o.id), Some("o1".to_string()));
    }
}
