//! Access-keyed chat rooms
//!
//! Rooms are created over HTTP with a name and a shared key. Sockets join a
//! room by name and chat within it; HTTP callers read a room's history by
//! presenting its key.

pub mod file;
pub mod gateway;
pub mod store;
pub mod types;

pub use file::FileStore;
pub use gateway::{GatewayError, RoomGateway};
pub use store::{MemoryStore, RoomStore, StoreError};
pub use types::{ChatMessage, IncomingChat, Room};
