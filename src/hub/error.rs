//! Hub error types

use thiserror::Error;

use super::frame::SubscriberId;

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Subscriber limit reached
    #[error("subscriber limit reached ({max})")]
    MaxSubscribers {
        /// Configured limit
        max: usize,
    },

    /// Subscriber is not (or no longer) connected
    #[error("subscriber not found: {0}")]
    SubscriberNotFound(SubscriberId),

    /// Subscriber queue is full
    #[error("subscriber queue full: {0}")]
    QueueFull(SubscriberId),

    /// Event could not be serialized
    #[error("failed to encode event: {0}")]
    Encode(String),
}
