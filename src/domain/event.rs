use serde::Deserialize;
use serde_json::Value;

use super::{Order, OrderId};
use crate::error::FeedError;

/// One push notification from the order subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// An order that was just placed.
    New(Order),
    /// A full replacement for an order that may already be listed.
    Update(Order),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Origin {
    New,
    Update,
}

#[derive(Deserialize)]
struct RawEvent {
    origin: Origin,
    order: Value,
}

impl FeedEvent {
    /// Validates a raw `{origin, order}` payload from the push channel.
    pub fn decode(raw: Value) -> Result<Self, FeedError> {
        let RawEvent { origin, order } = serde_json::from_value(raw)
            .map_err(|e| FeedError::MalformedEvent(e.to_string()))?;

        match order.get("_id").and_then(Value::as_str) {
            None => return Err(FeedError::MalformedEvent("order is missing `_id`".into())),
            Some("") => return Err(FeedError::MalformedEvent("order has an empty `_id`".into())),
            Some(_) => {}
        }

        let order: Order = serde_json::from_value(order)
            .map_err(|e| FeedError::MalformedEvent(e.to_string()))?;

        Ok(match origin {
            Origin::New => FeedEvent::New(order),
            Origin::Update => FeedEvent::Update(order),
        })
    }

    pub fn order(&self) -> &Order {
        match self {
            FeedEvent::New(order) | FeedEvent::Update(order) => order,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::New(_) => "new",
            FeedEvent::Update(_) => "update",
        }
    }
}
