//! Live packet-capture relay
//!
//! Runs a packet-capture tool (tshark by default) as a child process, splits
//! its standard output into newline-delimited JSON records and fans every
//! record out to all connected WebSocket clients. The same connections can
//! join access-keyed chat rooms whose messages are persisted before they are
//! relayed to the room.
//!
//! ```text
//!  tshark stdout ──► LineReframer ──► decode() ──► BroadcastHub ──► sockets
//!                                                      ▲
//!  socket chatMessage ──► RoomGateway (persist) ───────┘ (room-scoped)
//! ```

pub mod capture;
pub mod error;
pub mod hub;
pub mod rooms;
pub mod server;
pub mod signal;
pub mod stats;

pub use capture::{CaptureConfig, CaptureHandle, CaptureState, CaptureSupervisor, Record};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, HubConfig, SubscriberId};
pub use rooms::{ChatMessage, MemoryStore, Room, RoomGateway, RoomStore};
pub use server::{RelayServer, ServerConfig};
