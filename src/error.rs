use thiserror::Error;

use crate::domain::OrderStatus;

/// A status change the state machine refuses. Never sent to the mutation gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationFailure {
    #[error("Order is already {0}, no further status changes are allowed")]
    TerminalStatus(OrderStatus),
    #[error("Cannot change order status from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("A reason is required to cancel an order")]
    MissingCancellationReason,
    #[error("Rider cannot be assigned: {0}")]
    RiderNotAssignable(String),
    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),
}

/// Failures at the network/API layer of a gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Mutation rejected by server: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("Malformed feed event: {0}")]
    MalformedEvent(String),
    #[error("Order not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}
