//! Persistence contracts consumed by matchmaking and the battle engine.
//!
//! Every conditional operation returns `Option`/`bool` instead of an error
//! when its precondition no longer holds: losing a race is an expected
//! outcome and callers pick a fallback path.

pub mod memory;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::Result,
    models::{Battle, BattleAction, Move, Room, TeamWithBeasts, TurnCommit},
};

pub use memory::MemoryStore;

#[async_trait::async_trait]
pub trait RoomStore: Send + Sync {
    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>>;

    async fn get_room_by_slug(&self, slug: &str) -> Result<Option<Room>>;

    /// Any room still waiting for an opponent, skipping rooms owned by `excluding_player`.
    async fn find_waiting_room(&self, excluding_player: &str) -> Result<Option<Room>>;

    async fn find_waiting_room_owned_by(&self, player_id: &str) -> Result<Option<Room>>;

    /// A `full` or `active` room holding `player_id` on either side whose
    /// battle is not yet created or still active.
    async fn find_engaged_room(&self, player_id: &str) -> Result<Option<Room>>;

    /// Returns `false` when the slug is already taken.
    async fn insert_room(&self, room: &Room) -> Result<bool>;

    /// Sets player 2 and `full`, only while the room is still `waiting` with no player 2.
    async fn claim_room(
        &self,
        room_id: Uuid,
        player2_id: &str,
        player2_team_id: Uuid,
    ) -> Result<Option<Room>>;

    /// Sets `battle_id` and `active`, only while the room is `full` with no battle.
    async fn attach_battle(&self, room_id: Uuid, battle_id: Uuid) -> Result<Option<Room>>;

    /// Deletes the room only while it is `waiting` and owned by `owner_id`.
    async fn delete_waiting_room(&self, room_id: Uuid, owner_id: &str) -> Result<bool>;

    /// Deletes waiting rooms created before `cutoff` and returns them.
    async fn expire_waiting_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<Room>>;
}

#[async_trait::async_trait]
pub trait BattleStore: Send + Sync {
    async fn get_battle(&self, battle_id: Uuid) -> Result<Option<Battle>>;

    async fn insert_battle(&self, battle: &Battle) -> Result<()>;

    async fn delete_battle(&self, battle_id: Uuid) -> Result<()>;

    async fn get_team_with_beasts(&self, team_id: Uuid) -> Result<Option<TeamWithBeasts>>;

    async fn get_move(&self, move_id: Uuid) -> Result<Option<Move>>;

    async fn list_battle_actions(&self, battle_id: Uuid) -> Result<Vec<BattleAction>>;

    /// Applies the turn increment, winner, beast health and action log entry
    /// as one unit, conditioned on `current_turn == expected_turn` and the
    /// battle still being active. Writes nothing and returns `None` otherwise.
    async fn commit_turn(&self, commit: &TurnCommit) -> Result<Option<Battle>>;
}
