use chrono::Utc;
use std::sync::Arc;
use tokio::time::Duration;

use crate::{
    error::Result,
    services::room_feed::{ChangeFeed, RemovalReason, RoomEvent},
    store::RoomStore,
};

/// Removes waiting rooms nobody joined within the TTL.
pub struct RoomSweeper {
    rooms: Arc<dyn RoomStore>,
    feed: Arc<dyn ChangeFeed>,
    ttl: Duration,
    interval: Duration,
}

impl RoomSweeper {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        feed: Arc<dyn ChangeFeed>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            rooms,
            feed,
            ttl,
            interval,
        }
    }

    /// Start the sweep loop
    pub async fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.sweep_once().await {
                    tracing::error!("Room sweep error: {}", e);
                }

                tokio::time::sleep(self.interval).await;
            }
        });
    }

    pub async fn sweep_once(&self) -> Result<usize> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let expired = self.rooms.expire_waiting_rooms(cutoff).await?;

        for room in &expired {
            tracing::info!(
                "Expired waiting room {} opened by {}",
                room.slug,
                room.player1_id
            );
            self.feed
                .publish(RoomEvent::Removed {
                    room_id: room.id,
                    reason: RemovalReason::Expired,
                })
                .await;
        }

        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Room;
    use crate::services::room_feed::LocalRoomFeed;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_removes_stale_waiting_rooms_and_notifies() {
        let store = MemoryStore::new();
        let feed = LocalRoomFeed::new();
        let mut stale = Room::new_waiting("ashen-yak-0001".to_string(), "alice", Uuid::new_v4());
        stale.created_at = Utc::now() - chrono::Duration::minutes(30);
        let fresh = Room::new_waiting("misty-wisp-0002".to_string(), "bob", Uuid::new_v4());
        store.insert_room(&stale).await.unwrap();
        store.insert_room(&fresh).await.unwrap();

        let mut events = feed.subscribe(stale.id).await;
        let sweeper = RoomSweeper::new(
            Arc::new(store.clone()),
            Arc::new(feed.clone()),
            Duration::from_secs(900),
            Duration::from_secs(30),
        );

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(store.get_room(stale.id).await.unwrap().is_none());
        assert!(store.get_room(fresh.id).await.unwrap().is_some());
        assert!(matches!(
            events.recv().await.unwrap(),
            RoomEvent::Removed {
                reason: RemovalReason::Expired,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn sweep_never_touches_claimed_rooms() {
        let store = MemoryStore::new();
        let mut claimed = Room::new_waiting("rocky-heron-0003".to_string(), "alice", Uuid::new_v4());
        claimed.created_at = Utc::now() - chrono::Duration::hours(2);
        store.insert_room(&claimed).await.unwrap();
        store.claim_room(claimed.id, "bob", Uuid::new_v4()).await.unwrap();

        let sweeper = RoomSweeper::new(
            Arc::new(store.clone()),
            Arc::new(LocalRoomFeed::new()),
            Duration::from_secs(60),
            Duration::from_secs(30),
        );

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert!(store.get_room(claimed.id).await.unwrap().is_some());
    }
}
