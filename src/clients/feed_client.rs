use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument};

use crate::domain::{FeedEvent, Order, OrderId};
use crate::error::FeedError;
use crate::feed::{FeedView, MergeOutcome, OrderPage};
use crate::messages::FeedRequest;

/// Client for the feed service. Cheap to clone; every clone talks to the
/// same actor and sees the same published views.
#[derive(Clone)]
pub struct FeedClient {
    sender: mpsc::Sender<FeedRequest>,
    view: watch::Receiver<FeedView>,
}

impl FeedClient {
    pub fn new(sender: mpsc::Sender<FeedRequest>, view: watch::Receiver<FeedView>) -> Self {
        Self { sender, view }
    }

    /// Receiver notified after every list or selection change.
    pub fn changes(&self) -> watch::Receiver<FeedView> {
        self.view.clone()
    }

    /// The most recently published view, without a round trip to the actor.
    pub fn latest(&self) -> FeedView {
        self.view.borrow().clone()
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), FeedError> {
        debug!("Sending shutdown request");
        self.sender
            .send(FeedRequest::Shutdown)
            .await
            .map_err(|e| FeedError::ActorCommunicationError(e.to_string()))?;
        Ok(())
    }
}

client_method!(FeedClient => fn seed(page: OrderPage) -> FeedView as FeedRequest::Seed, Error = FeedError);
client_method!(FeedClient => fn apply_event(event: FeedEvent) -> MergeOutcome as FeedRequest::ApplyEvent, Error = FeedError);
client_method!(FeedClient => fn select(id: Option<OrderId>) -> Option<Order> as FeedRequest::Select, Error = FeedError);
client_method!(FeedClient => fn get_order(id: OrderId) -> Option<Order> as FeedRequest::GetOrder, Error = FeedError);
client_method!(FeedClient => fn get_view() -> FeedView as FeedRequest::GetView, Error = FeedError);
client_method!(FeedClient => fn record_failure(message: String) -> () as FeedRequest::RecordFailure, Error = FeedError);
