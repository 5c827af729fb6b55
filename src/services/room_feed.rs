use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::{constants::ROOM_FEED_CAPACITY, models::Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    Updated { room: Room },
    Removed { room_id: Uuid, reason: RemovalReason },
}

impl RoomEvent {
    pub fn room_id(&self) -> Uuid {
        match self {
            RoomEvent::Updated { room } => room.id,
            RoomEvent::Removed { room_id, .. } => *room_id,
        }
    }
}

/// Record-change notifications for individual rooms.
#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn publish(&self, event: RoomEvent);

    async fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RoomEvent>;
}

/// One broadcast channel per watched room, dropped once nobody listens.
#[derive(Clone, Default)]
pub struct LocalRoomFeed {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<RoomEvent>>>>,
}

impl LocalRoomFeed {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn watched_rooms(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait::async_trait]
impl ChangeFeed for LocalRoomFeed {
    async fn publish(&self, event: RoomEvent) {
        let room_id = event.room_id();
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(&room_id) else {
            return;
        };
        if sender.send(event.clone()).is_err() {
            channels.remove(&room_id);
            return;
        }
        if matches!(event, RoomEvent::Removed { .. }) {
            // Receivers still drain what was already sent.
            channels.remove(&room_id);
        }
    }

    async fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RoomEvent> {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&room_id) {
            return sender.subscribe();
        }
        let (tx, rx) = broadcast::channel(ROOM_FEED_CAPACITY);
        channels.insert(room_id, tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new_waiting("tidal-lynx-0042".to_string(), "alice", Uuid::new_v4())
    }

    #[tokio::test]
    async fn subscriber_receives_updates_for_its_room_only() {
        let feed = LocalRoomFeed::new();
        let watched = room();
        let other = room();
        let mut rx = feed.subscribe(watched.id).await;

        feed.publish(RoomEvent::Updated { room: other }).await;
        feed.publish(RoomEvent::Updated {
            room: watched.clone(),
        })
        .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.room_id(), watched.id);
    }

    #[tokio::test]
    async fn channel_is_pruned_after_last_receiver_leaves() {
        let feed = LocalRoomFeed::new();
        let watched = room();
        let rx = feed.subscribe(watched.id).await;
        assert_eq!(feed.watched_rooms().await, 1);

        drop(rx);
        feed.publish(RoomEvent::Updated { room: watched }).await;
        assert_eq!(feed.watched_rooms().await, 0);
    }

    #[tokio::test]
    async fn removal_is_delivered_then_channel_dropped() {
        let feed = LocalRoomFeed::new();
        let watched = room();
        let mut rx = feed.subscribe(watched.id).await;

        feed.publish(RoomEvent::Removed {
            room_id: watched.id,
            reason: RemovalReason::Cancelled,
        })
        .await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            RoomEvent::Removed {
                reason: RemovalReason::Cancelled,
                ..
            }
        ));
        assert_eq!(feed.watched_rooms().await, 0);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(RoomEvent::Removed {
            room_id: Uuid::nil(),
            reason: RemovalReason::Expired,
        })
        .unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(json["reason"], "expired");
    }
}
