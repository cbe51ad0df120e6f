use thiserror::Error;

use crate::error::{FeedError, TransportError, ValidationFailure};

/// Failures while starting or stopping the feed system.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid feed settings: {0}")]
    Settings(#[from] ValidationFailure),
    #[error("Could not subscribe to order events: {0}")]
    Subscribe(#[from] TransportError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}
