//! Error types for a3s-pubsub

use std::fmt;
use thiserror::Error;

/// Why a subscriber refused a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The subscriber's bounded buffer has no free slot
    Full,
    /// The consuming side of the subscriber is gone
    Closed,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryFailure::Full => f.write_str("buffer full"),
            DeliveryFailure::Closed => f.write_str("channel closed"),
        }
    }
}

/// Errors that can occur in the pub/sub system
#[derive(Debug, Error)]
pub enum PubSubError {
    /// Topic lookup without auto-create found nothing
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    /// A subscriber could not accept an event
    #[error("Delivery failed: {reason}")]
    Delivery { reason: DeliveryFailure },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PubSubError {
    /// Shorthand for a delivery failure
    pub fn delivery(reason: DeliveryFailure) -> Self {
        PubSubError::Delivery { reason }
    }
}

/// Result type alias for pub/sub operations
pub type Result<T> = std::result::Result<T, PubSubError>;
