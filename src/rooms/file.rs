//! JSON file-backed store
//!
//! The whole store is one JSON document. Every mutation rewrites it to a
//! temporary file and renames it into place; memory is only updated after
//! the write succeeded, so a failed write leaves no trace.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::store::{RoomStore, StoreData, StoreError, Tables};
use super::types::{ChatMessage, Room};

/// Store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl FileStore {
    /// Open a store, loading the file if it exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => Tables::from_data(serde_json::from_slice::<StoreData>(&bytes)?)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), "Room store opened");

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&tables.to_data())?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        // contents must be on disk before the rename makes them visible
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RoomStore for FileStore {
    async fn create_room(&self, room: Room) -> Result<Room, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let room = next.insert_room(room)?;
        self.persist(&next).await?;
        *tables = next;
        Ok(room)
    }

    async fn room(&self, name: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.lock().await.room(name))
    }

    async fn room_by_key(&self, key: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.lock().await.room_by_key(key))
    }

    async fn append_message(&self, message: ChatMessage) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        next.push_message(message);
        self.persist(&next).await?;
        *tables = next;
        Ok(())
    }

    async fn messages(&self, room: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.tables.lock().await.messages(room))
    }
}
