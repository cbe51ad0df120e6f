//! Boundaries to the remote order API.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::StatusChange;
use crate::error::TransportError;
use crate::feed::{OrderPage, PageRequest};

pub mod memory;

pub use memory::InMemoryBackend;

/// Pull side: fetches one page of orders.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn fetch_orders(&self, request: &PageRequest) -> Result<OrderPage, TransportError>;
}

/// Push side: raw `{origin, order}` payloads for one scope, in delivery order.
/// Dropping the receiver ends the subscription.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, scope: &str) -> Result<mpsc::Receiver<Value>, TransportError>;
}

/// Order mutations. `Ok(false)` means the server declined the change.
#[async_trait]
pub trait MutationGateway: Send + Sync {
    async fn update_status(&self, change: &StatusChange) -> Result<bool, TransportError>;

    async fn assign_rider(&self, order_id: &str, rider_id: &str) -> Result<bool, TransportError>;
}
