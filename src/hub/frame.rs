//! Subscriber identifiers and socket events
//!
//! Events travel over the WebSocket as JSON text frames of the form
//! `{"event": "<name>", "data": <payload>}`.
//!
//! | Direction | Event         | Payload                                    |
//! |-----------|---------------|--------------------------------------------|
//! | out       | `packetData`  | one capture record                         |
//! | out       | `chatMessage` | `{username, message, room, timestamp}`     |
//! | out       | `roomJoined`  | `{room}`                                   |
//! | out       | `chatError`   | `{message}`, sent to the originating socket |
//! | in        | `joinRoom`    | room name                                  |
//! | in        | `chatMessage` | `{username, message, room, timestamp?}`    |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capture::Record;
use crate::rooms::{ChatMessage, IncomingChat};

/// Opaque identifier of a connected subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Event pushed to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundEvent<'a> {
    /// One decoded capture record
    PacketData(&'a Record),
    /// A persisted chat message
    ChatMessage(&'a ChatMessage),
    /// Confirmation of a join
    RoomJoined {
        /// Joined room name
        room: &'a str,
    },
    /// A chat message from this socket was not relayed
    ChatError {
        /// Human-readable reason
        message: String,
    },
}

/// Event received from a subscriber
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundEvent {
    /// Add this connection to a room's delivery set
    JoinRoom(String),
    /// Persist and relay a chat message
    ChatMessage(IncomingChat),
}

/// A serialized event, shared by every subscriber it is queued to
///
/// Encoding happens once per broadcast; cloning only bumps a refcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Serialize an event
    pub fn encode(event: &OutboundEvent<'_>) -> Result<Self, serde_json::Error> {
        serde_json::to_string(event).map(|s| Self(s.into()))
    }

    /// JSON text of the event
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
