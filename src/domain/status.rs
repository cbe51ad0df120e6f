use std::fmt;

use serde::{Deserialize, Serialize};

use super::OrderId;
use crate::error::ValidationFailure;

/// Order lifecycle status.
///
/// ```text
/// PENDING ──► ACCEPTED ──► PICKED ───┐
///    │            │  └───► ASSIGNED ─┼──► DELIVERED
///    │            └──────────────────┘
///    └──────────► CANCELLED ◄── (any non-terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Picked,
    Assigned,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses reachable from this one by a single staff action.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Accepted, Cancelled],
            Accepted => &[Picked, Assigned, Delivered, Cancelled],
            Picked | Assigned => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Picked => "PICKED",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change as requested from the order detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeRequest {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub reason: Option<String>,
}

impl StatusChangeRequest {
    pub fn new(order_id: impl Into<OrderId>, new_status: OrderStatus) -> Self {
        Self {
            order_id: order_id.into(),
            new_status,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A validated status change, ready for the mutation gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    /// Only set for cancellations.
    pub reason: Option<String>,
}

/// Checks `request` against the transition table for an order currently in `current`.
pub fn validate_transition(
    current: OrderStatus,
    request: StatusChangeRequest,
) -> Result<StatusChange, ValidationFailure> {
    if current.is_terminal() {
        return Err(ValidationFailure::TerminalStatus(current));
    }
    if !current.can_transition_to(request.new_status) {
        return Err(ValidationFailure::IllegalTransition {
            from: current,
            to: request.new_status,
        });
    }

    let reason = match request.new_status {
        OrderStatus::Cancelled => {
            let reason = request
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .ok_or(ValidationFailure::MissingCancellationReason)?;
            Some(reason)
        }
        _ => None,
    };

    Ok(StatusChange {
        order_id: request.order_id,
        new_status: request.new_status,
        reason,
    })
}
