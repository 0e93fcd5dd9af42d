//! Room and chat message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An access-keyed chat room, unique by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room name
    pub name: String,
    /// Shared access key
    pub key: String,
}

impl Room {
    /// Create a room with its access key
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Whether the presented key opens this room
    pub fn accepts(&self, key: &str) -> bool {
        self.key == key
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name chosen by the sender
    pub username: String,
    /// Message text
    pub message: String,
    /// Room the message was sent to
    pub room: String,
    /// Client time when supplied, otherwise receive time
    pub timestamp: DateTime<Utc>,
}

/// A chat message as sent by a client
///
/// The server stamps messages that arrive without a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingChat {
    pub username: String,
    pub message: String,
    pub room: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IncomingChat {
    /// Fill in the timestamp
    pub fn into_message(self, now: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            username: self.username,
            message: self.message,
            room: self.room,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}
