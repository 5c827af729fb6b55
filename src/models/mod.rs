// src/models/mod.rs
pub mod battle;

use serde::Serialize;

pub use battle::{
    Battle, BattleAction, BattleStatus, Beast, ElementType, Health, Move, NewBattleAction, Room,
    RoomStatus, Team, TeamWithBeasts, TurnCommit,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
