//! Broadcast hub for telemetry and room chat
//!
//! Every connection registers with the hub and gets a bounded queue that its
//! writer task drains into the socket. The hub pushes onto those queues:
//!
//! ```text
//!                         Arc<BroadcastHub>
//!                  ┌────────────────────────────┐
//!                  │ subscribers: id -> Sender  │
//!                  │ rooms: name -> {id, ...}   │
//!                  └─────────────┬──────────────┘
//!          broadcast_packet()    │    broadcast_chat(room)
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!   [queue sub-1]           [queue sub-2]           [queue sub-3]
//!   writer task ──► WS      writer task ──► WS      writer task ──► WS
//! ```
//!
//! Events are serialized once into a [`Frame`] and shared between queues.

pub mod config;
pub mod error;
pub mod frame;
pub mod registry;

pub use config::HubConfig;
pub use error::HubError;
pub use frame::{Frame, InboundEvent, OutboundEvent, SubscriberId};
pub use registry::BroadcastHub;
