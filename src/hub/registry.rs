//! Broadcast hub implementation
//!
//! Holds the connection registry (all subscribers plus per-room member sets)
//! and fans events out to it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use super::config::HubConfig;
use super::error::HubError;
use super::frame::{Frame, OutboundEvent, SubscriberId};
use crate::capture::Record;
use crate::rooms::ChatMessage;
use crate::stats::{HubSnapshot, HubStats};

/// Per-subscriber state kept by the hub
#[derive(Debug)]
struct SubscriberEntry {
    /// Queue drained by the connection's writer task
    tx: mpsc::Sender<Frame>,
    /// Rooms this subscriber joined
    rooms: HashSet<String>,
}

#[derive(Debug, Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    rooms: HashMap<String, HashSet<SubscriberId>>,
}

/// Central fan-out point for telemetry and chat
///
/// Thread-safe via `RwLock`. Broadcasts snapshot the target senders and
/// enqueue to them while holding the read lock, so a disconnect never
/// observes a half-iterated set and is never delivered to afterwards.
/// Delivery is a non-blocking enqueue: a subscriber whose queue is full
/// loses that event, and nobody else waits for it.
#[derive(Debug)]
pub struct BroadcastHub {
    registry: RwLock<Registry>,
    config: HubConfig,
    next_id: AtomicU64,
    stats: HubStats,
}

impl BroadcastHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            config,
            next_id: AtomicU64::new(1),
            stats: HubStats::new(),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// The subscriber receives telemetry immediately. Returns its id and the
    /// queue its writer should drain.
    pub async fn connect(&self) -> Result<(SubscriberId, mpsc::Receiver<Frame>), HubError> {
        let mut registry = self.registry.write().await;

        let max = self.config.max_subscribers;
        if max > 0 && registry.subscribers.len() >= max {
            return Err(HubError::MaxSubscribers { max });
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);

        registry.subscribers.insert(
            id,
            SubscriberEntry {
                tx,
                rooms: HashSet::new(),
            },
        );
        self.stats.inc_connections();

        tracing::info!(
            subscriber = %id,
            subscribers = registry.subscribers.len(),
            "Subscriber connected"
        );

        Ok((id, rx))
    }

    /// Remove a subscriber from the telemetry set and every room it joined
    ///
    /// Returns false if the subscriber was not registered.
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.write().await;

        let Some(entry) = registry.subscribers.remove(&id) else {
            return false;
        };

        for room in &entry.rooms {
            if let Some(members) = registry.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    registry.rooms.remove(room);
                }
            }
        }

        tracing::info!(
            subscriber = %id,
            rooms = entry.rooms.len(),
            subscribers = registry.subscribers.len(),
            "Subscriber disconnected"
        );

        true
    }

    /// Add a subscriber to a room's delivery set
    ///
    /// Idempotent. Returns true if the subscriber was not already a member.
    pub async fn join_room(&self, id: SubscriberId, room: &str) -> Result<bool, HubError> {
        let mut registry = self.registry.write().await;

        let entry = registry
            .subscribers
            .get_mut(&id)
            .ok_or(HubError::SubscriberNotFound(id))?;

        if !entry.rooms.insert(room.to_string()) {
            return Ok(false);
        }

        let members = registry.rooms.entry(room.to_string()).or_default();
        members.insert(id);

        tracing::debug!(
            subscriber = %id,
            room = room,
            members = members.len(),
            "Subscriber joined room"
        );

        Ok(true)
    }

    /// Check whether a subscriber has joined a room
    pub async fn is_member(&self, id: SubscriberId, room: &str) -> bool {
        let registry = self.registry.read().await;
        registry
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(&id))
    }

    /// Push a record to every connected subscriber
    ///
    /// Returns the number of subscribers it was queued to.
    pub async fn broadcast_packet(&self, record: &Record) -> usize {
        let Some(frame) = self.encode(&OutboundEvent::PacketData(record)) else {
            return 0;
        };

        let registry = self.registry.read().await;
        let targets: Vec<_> = registry
            .subscribers
            .iter()
            .map(|(id, entry)| (*id, entry.tx.clone()))
            .collect();

        self.deliver(targets, frame)
    }

    /// Push a chat message to the members of its room
    ///
    /// Returns the number of members it was queued to.
    pub async fn broadcast_chat(&self, message: &ChatMessage) -> usize {
        let Some(frame) = self.encode(&OutboundEvent::ChatMessage(message)) else {
            return 0;
        };

        let registry = self.registry.read().await;
        let targets: Vec<_> = match registry.rooms.get(&message.room) {
            Some(members) => members
                .iter()
                .filter_map(|id| {
                    registry
                        .subscribers
                        .get(id)
                        .map(|entry| (*id, entry.tx.clone()))
                })
                .collect(),
            None => Vec::new(),
        };

        self.deliver(targets, frame)
    }

    /// Send an event to a single subscriber
    pub async fn send_to(
        &self,
        id: SubscriberId,
        event: &OutboundEvent<'_>,
    ) -> Result<(), HubError> {
        let frame = Frame::encode(event).map_err(|e| HubError::Encode(e.to_string()))?;

        let tx = {
            let registry = self.registry.read().await;
            registry
                .subscribers
                .get(&id)
                .map(|entry| entry.tx.clone())
                .ok_or(HubError::SubscriberNotFound(id))?
        };

        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.add_delivered(1);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.add_dropped(1);
                Err(HubError::QueueFull(id))
            }
            Err(TrySendError::Closed(_)) => Err(HubError::SubscriberNotFound(id)),
        }
    }

    /// Number of connected subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.registry.read().await.subscribers.len()
    }

    /// Number of rooms with at least one member
    pub async fn room_count(&self) -> usize {
        self.registry.read().await.rooms.len()
    }

    /// Members of a room, sorted by id
    pub async fn room_members(&self, room: &str) -> Vec<SubscriberId> {
        let registry = self.registry.read().await;
        let mut members: Vec<_> = registry
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Counters plus current registry sizes
    pub async fn snapshot(&self) -> HubSnapshot {
        let registry = self.registry.read().await;
        HubSnapshot {
            active_connections: registry.subscribers.len() as u64,
            rooms: registry.rooms.len() as u64,
            ..self.stats.snapshot()
        }
    }

    fn encode(&self, event: &OutboundEvent<'_>) -> Option<Frame> {
        match Frame::encode(event) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode event");
                None
            }
        }
    }

    /// Queue `frame` to each target without waiting
    ///
    /// Callers hold the registry read guard, so a `disconnect` either happens
    /// before the snapshot or after delivery completes.
    fn deliver(&self, targets: Vec<(SubscriberId, mpsc::Sender<Frame>)>, frame: Frame) -> usize {
        let mut delivered = 0;
        let mut dropped = 0;

        for (id, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::debug!(subscriber = %id, "Subscriber queue full, event dropped");
                }
                // connection is closing; disconnect() will clean up
                Err(TrySendError::Closed(_)) => {}
            }
        }

        self.stats.add_delivered(delivered);
        self.stats.add_dropped(dropped);
        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
