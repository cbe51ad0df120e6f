use tokio::sync::oneshot;

use crate::domain::{FeedEvent, Order, OrderId};
use crate::error::FeedError;
use crate::feed::{FeedView, MergeOutcome, OrderPage};

/// Generic type aliases for service communication
pub type ServiceResult<T, E> = std::result::Result<T, E>;
pub type ServiceResponse<T, E> = oneshot::Sender<ServiceResult<T, E>>;

/// Messages understood by the feed service. Each variant carries its
/// parameters and a oneshot channel for the reply.
#[derive(Debug)]
pub enum FeedRequest {
    Seed {
        page: OrderPage,
        respond_to: ServiceResponse<FeedView, FeedError>,
    },
    ApplyEvent {
        event: FeedEvent,
        respond_to: ServiceResponse<MergeOutcome, FeedError>,
    },
    Select {
        id: Option<OrderId>,
        respond_to: ServiceResponse<Option<Order>, FeedError>,
    },
    GetOrder {
        id: OrderId,
        respond_to: ServiceResponse<Option<Order>, FeedError>,
    },
    GetView {
        respond_to: ServiceResponse<FeedView, FeedError>,
    },
    RecordFailure {
        message: String,
        respond_to: ServiceResponse<(), FeedError>,
    },
    Shutdown,
}
