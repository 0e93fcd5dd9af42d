//! Room and message persistence
//!
//! [`RoomStore`] is the boundary to whatever keeps rooms and chat history.
//! Two implementations ship with the crate: [`MemoryStore`] and
//! [`FileStore`](super::file::FileStore).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::{ChatMessage, Room};

/// Storage error
#[derive(Debug, Error)]
pub enum StoreError {
    /// A room with this name already exists
    #[error("room already exists: {0}")]
    RoomExists(String),

    /// Backing file could not be read or written
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file is not valid store data
    #[error("corrupt store data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistence of rooms and chat history
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create a room; names are unique
    async fn create_room(&self, room: Room) -> Result<Room, StoreError>;

    /// Look up a room by name
    async fn room(&self, name: &str) -> Result<Option<Room>, StoreError>;

    /// Look up the first room (by name) whose key matches
    async fn room_by_key(&self, key: &str) -> Result<Option<Room>, StoreError>;

    /// Append a message to its room's history
    async fn append_message(&self, message: ChatMessage) -> Result<(), StoreError>;

    /// History of a room, ordered by timestamp ascending
    async fn messages(&self, room: &str) -> Result<Vec<ChatMessage>, StoreError>;
}

/// In-memory tables shared by both store implementations
#[derive(Debug, Clone, Default)]
pub(super) struct Tables {
    rooms: BTreeMap<String, Room>,
    messages: BTreeMap<String, Vec<ChatMessage>>,
}

/// On-disk layout of the tables
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct StoreData {
    #[serde(default)]
    rooms: Vec<Room>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

impl Tables {
    pub(super) fn insert_room(&mut self, room: Room) -> Result<Room, StoreError> {
        if self.rooms.contains_key(&room.name) {
            return Err(StoreError::RoomExists(room.name));
        }
        self.rooms.insert(room.name.clone(), room.clone());
        Ok(room)
    }

    pub(super) fn room(&self, name: &str) -> Option<Room> {
        self.rooms.get(name).cloned()
    }

    pub(super) fn room_by_key(&self, key: &str) -> Option<Room> {
        self.rooms.values().find(|room| room.accepts(key)).cloned()
    }

    pub(super) fn push_message(&mut self, message: ChatMessage) {
        let history = self.messages.entry(message.room.clone()).or_default();
        // equal timestamps keep arrival order
        let at = history.partition_point(|m| m.timestamp <= message.timestamp);
        history.insert(at, message);
    }

    pub(super) fn messages(&self, room: &str) -> Vec<ChatMessage> {
        self.messages.get(room).cloned().unwrap_or_default()
    }

    pub(super) fn from_data(data: StoreData) -> Result<Self, StoreError> {
        let mut tables = Self::default();
        for room in data.rooms {
            tables.insert_room(room)?;
        }
        for message in data.messages {
            tables.push_message(message);
        }
        Ok(tables)
    }

    pub(super) fn to_data(&self) -> StoreData {
        StoreData {
            rooms: self.rooms.values().cloned().collect(),
            messages: self.messages.values().flatten().cloned().collect(),
        }
    }
}

/// Volatile store; history is lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, room: Room) -> Result<Room, StoreError> {
        self.tables.write().await.insert_room(room)
    }

    async fn room(&self, name: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.read().await.room(name))
    }

    async fn room_by_key(&self, key: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.read().await.room_by_key(key))
    }

    async fn append_message(&self, message: ChatMessage) -> Result<(), StoreError> {
        self.tables.write().await.push_message(message);
        Ok(())
    }

    async fn messages(&self, room: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.tables.read().await.messages(room))
    }
}
