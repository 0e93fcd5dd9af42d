//! Room access checks and the chat relay
//!
//! Chat is persist-then-broadcast: a message reaches the room only after the
//! store accepted it. A message that fails to persist is reported back to
//! the sender and nobody else sees it.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::store::{RoomStore, StoreError};
use super::types::{ChatMessage, IncomingChat, Room};
use crate::hub::{BroadcastHub, HubError, SubscriberId};

/// Chat relay and room access error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Room does not exist or the key does not match
    #[error("access denied")]
    AccessDenied,

    /// Sender has not joined the message's room
    #[error("not a member of room '{0}'")]
    NotJoined(String),

    /// No room with this name was ever created
    #[error("unknown room '{0}'")]
    UnknownRoom(String),

    /// Message or room field is empty
    #[error("invalid message: {0}")]
    Invalid(&'static str),

    /// Store rejected the operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Hub rejected the operation
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Front door to rooms: access validation, persistence, room-scoped relay
pub struct RoomGateway {
    store: Arc<dyn RoomStore>,
    hub: Arc<BroadcastHub>,
}

impl std::fmt::Debug for RoomGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomGateway").finish_non_exhaustive()
    }
}

impl RoomGateway {
    /// Create a gateway over `store` that relays through `hub`
    pub fn new(store: Arc<dyn RoomStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, hub }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Return the room if `key` opens it
    pub async fn validate_room(&self, name: &str, key: &str) -> Result<Room, GatewayError> {
        match self.store.room(name).await? {
            Some(room) if room.accepts(key) => Ok(room),
            _ => Err(GatewayError::AccessDenied),
        }
    }

    /// Find the room opened by `key`
    pub async fn find_room(&self, key: &str) -> Result<Room, GatewayError> {
        self.store
            .room_by_key(key)
            .await?
            .ok_or(GatewayError::AccessDenied)
    }

    /// Create a room
    pub async fn create_room(&self, name: &str, key: &str) -> Result<Room, GatewayError> {
        if name.trim().is_empty() {
            return Err(GatewayError::Invalid("room name is empty"));
        }
        let room = self.store.create_room(Room::new(name, key)).await?;
        tracing::info!(room = %room.name, "Room created");
        Ok(room)
    }

    /// Message history of a room the caller holds the key for
    pub async fn history(&self, name: &str, key: &str) -> Result<Vec<ChatMessage>, GatewayError> {
        let room = self.validate_room(name, key).await?;
        Ok(self.store.messages(&room.name).await?)
    }

    /// Add a subscriber to an existing room's delivery set
    ///
    /// Returns true if the subscriber was not already a member.
    pub async fn join_room(&self, sender: SubscriberId, room: &str) -> Result<bool, GatewayError> {
        if room.is_empty() {
            return Err(GatewayError::Invalid("room is empty"));
        }
        if self.store.room(room).await?.is_none() {
            return Err(GatewayError::UnknownRoom(room.to_string()));
        }
        Ok(self.hub.join_room(sender, room).await?)
    }

    /// Persist a message
    pub async fn persist_message(&self, message: ChatMessage) -> Result<(), GatewayError> {
        self.store.append_message(message).await?;
        Ok(())
    }

    /// Relay a chat message from `sender` to its room
    ///
    /// Returns the persisted message and the number of members it was
    /// queued to.
    pub async fn relay_chat(
        &self,
        sender: SubscriberId,
        incoming: IncomingChat,
    ) -> Result<(ChatMessage, usize), GatewayError> {
        if incoming.room.is_empty() {
            return Err(GatewayError::Invalid("room is empty"));
        }
        if self.store.room(&incoming.room).await?.is_none() {
            return Err(GatewayError::UnknownRoom(incoming.room));
        }
        if !self.hub.is_member(sender, &incoming.room).await {
            return Err(GatewayError::NotJoined(incoming.room));
        }

        let message = incoming.into_message(Utc::now());
        if let Err(e) = self.persist_message(message.clone()).await {
            tracing::warn!(
                subscriber = %sender,
                room = %message.room,
                error = %e,
                "Chat message not persisted, not relayed"
            );
            return Err(e);
        }

        let delivered = self.hub.broadcast_chat(&message).await;
        tracing::debug!(
            subscriber = %sender,
            room = %message.room,
            delivered = delivered,
            "Chat message relayed"
        );

        Ok((message, delivered))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::rooms::MemoryStore;

    /// Store whose rooms all exist but whose writes always fail
    struct BrokenStore;

    #[async_trait]
    impl RoomStore for BrokenStore {
        async fn create_room(&self, _room: Room) -> Result<Room, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn room(&self, name: &str) -> Result<Option<Room>, StoreError> {
            Ok(Some(Room::new(name, "k1")))
        }

        async fn room_by_key(&self, _key: &str) -> Result<Option<Room>, StoreError> {
            Ok(None)
        }

        async fn append_message(&self, _message: ChatMessage) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn messages(&self, _room: &str) -> Result<Vec<ChatMessage>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn incoming(room: &str, text: &str) -> IncomingChat {
        IncomingChat {
            username: "ana".into(),
            message: text.into(),
            room: room.into(),
            timestamp: None,
        }
    }

    fn gateway(store: Arc<dyn RoomStore>) -> (RoomGateway, Arc<BroadcastHub>) {
        let hub = Arc::new(BroadcastHub::new());
        (RoomGateway::new(store, Arc::clone(&hub)), hub)
    }

    #[tokio::test]
    async fn test_validate_room() {
        let (gateway, _hub) = gateway(Arc::new(MemoryStore::new()));
        gateway.create_room("lobby", "k1").await.unwrap();

        assert_eq!(
            gateway.validate_room("lobby", "k1").await.unwrap(),
            Room::new("lobby", "k1")
        );
        assert!(matches!(
            gateway.validate_room("lobby", "bad").await,
            Err(GatewayError::AccessDenied)
        ));
        assert!(matches!(
            gateway.validate_room("attic", "k1").await,
            Err(GatewayError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_relay_persists_then_broadcasts() {
        let (gateway, hub) = gateway(Arc::new(MemoryStore::new()));
        gateway.create_room("lobby", "k1").await.unwrap();

        let (sender, mut sender_rx) = hub.connect().await.unwrap();
        let (outsider, mut outsider_rx) = hub.connect().await.unwrap();
        hub.join_room(sender, "lobby").await.unwrap();
        hub.join_room(outsider, "attic").await.unwrap();

        let (message, delivered) = gateway
            .relay_chat(sender, incoming("lobby", "hello"))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert!(sender_rx.recv().await.unwrap().as_str().contains("hello"));
        assert!(outsider_rx.try_recv().is_err());
        assert_eq!(gateway.history("lobby", "k1").await.unwrap(), vec![message]);
    }

    #[tokio::test]
    async fn test_relay_requires_membership() {
        let (gateway, hub) = gateway(Arc::new(MemoryStore::new()));
        gateway.create_room("lobby", "k1").await.unwrap();
        let (sender, _rx) = hub.connect().await.unwrap();

        let result = gateway.relay_chat(sender, incoming("lobby", "hello")).await;

        assert!(matches!(result, Err(GatewayError::NotJoined(room)) if room == "lobby"));
        assert!(gateway.store().messages("lobby").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_is_not_broadcast() {
        let (gateway, hub) = gateway(Arc::new(BrokenStore));
        let (sender, mut sender_rx) = hub.connect().await.unwrap();
        let (peer, mut peer_rx) = hub.connect().await.unwrap();
        hub.join_room(sender, "lobby").await.unwrap();
        hub.join_room(peer, "lobby").await.unwrap();

        let result = gateway.relay_chat(sender, incoming("lobby", "lost")).await;

        assert!(matches!(result, Err(GatewayError::Store(_))));
        assert!(sender_rx.try_recv().is_err());
        assert!(peer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_room_rejects_empty_name() {
        let (gateway, _hub) = gateway(Arc::new(MemoryStore::new()));

        assert!(matches!(
            gateway.create_room("  ", "k").await,
            Err(GatewayError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_join_room_requires_existing_room() {
        let (gateway, hub) = gateway(Arc::new(MemoryStore::new()));
        gateway.create_room("lobby", "k1").await.unwrap();
        let (sender, _rx) = hub.connect().await.unwrap();

        assert!(gateway.join_room(sender, "lobby").await.unwrap());
        assert!(!gateway.join_room(sender, "lobby").await.unwrap());
        assert!(matches!(
            gateway.join_room(sender, "ghost").await,
            Err(GatewayError::UnknownRoom(room)) if room == "ghost"
        ));
        assert!(matches!(
            gateway.join_room(sender, "").await,
            Err(GatewayError::Invalid(_))
        ));
        assert!(!hub.is_member(sender, "ghost").await);
    }

    #[tokio::test]
    async fn test_chat_to_uncreated_room_is_not_persisted() {
        let (gateway, hub) = gateway(Arc::new(MemoryStore::new()));
        let (sender, mut rx) = hub.connect().await.unwrap();
        // hub membership alone does not make a room exist
        hub.join_room(sender, "ghost").await.unwrap();

        let result = gateway.relay_chat(sender, incoming("ghost", "planted")).await;
        assert!(matches!(result, Err(GatewayError::UnknownRoom(room)) if room == "ghost"));
        assert!(rx.try_recv().is_err());

        gateway.create_room("ghost", "k").await.unwrap();
        assert!(gateway.history("ghost", "k").await.unwrap().is_empty());
    }
}
