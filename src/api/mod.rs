// src/api/mod.rs

pub mod battle;
pub mod health;
pub mod matchmaking;

use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::services::{
    BattleEngine, ChangeFeed, JoinRateLimiter, MatchmakingCoordinator,
};
use crate::store::{BattleStore, RoomStore};

#[derive(Clone)]
pub struct AppState {
    pub matchmaking: Arc<MatchmakingCoordinator>,
    pub engine: Arc<BattleEngine>,
    pub feed: Arc<dyn ChangeFeed>,
    pub join_limiter: JoinRateLimiter,
    pub db: Option<Database>,
    pub redis: Option<ConnectionManager>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        rooms: Arc<dyn RoomStore>,
        battles: Arc<dyn BattleStore>,
        feed: Arc<dyn ChangeFeed>,
        db: Option<Database>,
        redis: Option<ConnectionManager>,
    ) -> Self {
        let matchmaking = Arc::new(MatchmakingCoordinator::new(
            rooms,
            battles.clone(),
            feed.clone(),
            config.team_resolution,
            Duration::from_secs(config.room_recheck_interval_secs.max(1)),
        ));
        let engine = Arc::new(BattleEngine::new(battles));
        let join_limiter = JoinRateLimiter::new(redis.clone(), config.join_rate_limit_per_minute);

        Self {
            matchmaking,
            engine,
            feed,
            join_limiter,
            db,
            redis,
            config,
        }
    }
}

/// Parses a UUID-valued request field, naming the field on failure.
pub fn parse_uuid(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("{} must be a UUID, got '{}'", field, raw)))
}
