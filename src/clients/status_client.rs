use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, instrument, warn};

use super::FeedClient;
use crate::domain::{validate_transition, Order, StatusChange, StatusChangeRequest};
use crate::error::{FeedError, TransportError, ValidationFailure};
use crate::gateway::MutationGateway;

/// Submits status changes and rider assignments for orders in the feed.
///
/// Every request is validated against the order's current status before the
/// gateway sees it. A successful mutation asks the poller for a fresh pull.
#[derive(Clone)]
pub struct StatusClient {
    feed: FeedClient,
    gateway: Arc<dyn MutationGateway>,
    refresh: Arc<Notify>,
}

impl StatusClient {
    pub fn new(feed: FeedClient, gateway: Arc<dyn MutationGateway>, refresh: Arc<Notify>) -> Self {
        Self { feed, gateway, refresh }
    }

    async fn current(&self, order_id: &str) -> Result<Order, FeedError> {
        self.feed
            .get_order(order_id.to_string())
            .await?
            .ok_or_else(|| FeedError::NotFound(order_id.to_string()))
    }

    #[instrument(skip(self), fields(order_id = %request.order_id, to = %request.new_status))]
    pub async fn change_status(&self, request: StatusChangeRequest) -> Result<StatusChange, FeedError> {
        let order = self.current(&request.order_id).await?;
        let change = validate_transition(order.order_status, request).inspect_err(|e| {
            warn!(from = %order.order_status, error = %e, "Status change refused");
        })?;

        let accepted = self.gateway.update_status(&change).await?;
        if !accepted {
            warn!("Status change declined by server");
            return Err(TransportError::Rejected(format!("status change for order {}", change.order_id)).into());
        }

        info!(from = %order.order_status, "Status changed");
        self.refresh.notify_one();
        Ok(change)
    }

    #[instrument(skip(self))]
    pub async fn assign_rider(&self, order_id: &str, rider_id: &str) -> Result<(), FeedError> {
        let order = self.current(order_id).await?;
        if !order.rider_assignable() {
            let why = if order.is_picked_up {
                "order already picked up".to_string()
            } else {
                format!("order is {}", order.order_status)
            };
            warn!(reason = %why, "Rider assignment refused");
            return Err(ValidationFailure::RiderNotAssignable(why).into());
        }

        if !self.gateway.assign_rider(order_id, rider_id).await? {
            warn!("Rider assignment declined by server");
            return Err(TransportError::Rejected(format!("rider assignment for order {}", order_id)).into());
        }

        info!("Rider assigned");
        self.refresh.notify_one();
        Ok(())
    }
}
