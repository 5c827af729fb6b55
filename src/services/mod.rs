// Battle core and matchmaking services
pub mod battle_engine;
pub mod damage_resolver;
pub mod join_limiter;
pub mod matchmaking;
pub mod room_feed;
pub mod room_sweeper;
pub mod turn_validator;

// Re-export for convenience
pub use battle_engine::BattleEngine;
pub use join_limiter::JoinRateLimiter;
pub use matchmaking::MatchmakingCoordinator;
pub use room_feed::{ChangeFeed, LocalRoomFeed};
pub use room_sweeper::RoomSweeper;

use crate::{config::Config, store::RoomStore};
use std::sync::Arc;
use tokio::time::Duration;

/// Start all background services
pub async fn start_background_services(
    rooms: Arc<dyn RoomStore>,
    feed: Arc<dyn ChangeFeed>,
    config: Config,
) {
    tracing::info!("Starting background services...");

    if config.waiting_room_ttl_secs == 0 {
        tracing::warn!("Room sweeper disabled via WAITING_ROOM_TTL_SECS=0");
    } else {
        let sweeper = Arc::new(RoomSweeper::new(
            rooms,
            feed,
            Duration::from_secs(config.waiting_room_ttl_secs),
            Duration::from_secs(config.room_sweep_interval_secs.max(1)),
        ));
        sweeper.start().await;
    }

    tracing::info!("Background services started");
}
