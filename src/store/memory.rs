use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BattleStore, RoomStore};
use crate::{
    constants::{MAX_MOVE_SLOTS, MAX_TEAM_SIZE},
    error::{AppError, Result},
    models::{
        Battle, BattleAction, BattleStatus, Beast, ElementType, Health, Move, Room, RoomStatus,
        Team, TeamWithBeasts, TurnCommit,
    },
};

#[derive(Default)]
struct MemoryState {
    rooms: HashMap<Uuid, Room>,
    battles: HashMap<Uuid, Battle>,
    teams: HashMap<Uuid, Team>,
    beasts: HashMap<Uuid, Beast>,
    moves: HashMap<Uuid, Move>,
    actions: Vec<BattleAction>,
    next_action_id: i64,
}

/// Process-local store. Every conditional operation runs under one write
/// lock, which gives the same compare-and-swap guarantees as the SQL store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_move(&self, mv: Move) {
        self.state.write().await.moves.insert(mv.id, mv);
    }

    pub async fn insert_beast(&self, beast: Beast) -> Result<()> {
        if beast.moves.len() > MAX_MOVE_SLOTS {
            return Err(AppError::BadRequest(format!(
                "Beast {} has more than {} moves",
                beast.name, MAX_MOVE_SLOTS
            )));
        }
        self.state.write().await.beasts.insert(beast.id, beast);
        Ok(())
    }

    pub async fn insert_team(&self, team: Team) -> Result<()> {
        if team.beast_ids.len() > MAX_TEAM_SIZE {
            return Err(AppError::BadRequest(format!(
                "Team {} has more than {} beasts",
                team.name, MAX_TEAM_SIZE
            )));
        }
        self.state.write().await.teams.insert(team.id, team);
        Ok(())
    }

    #[cfg(test)]
    pub async fn battle_count(&self) -> usize {
        self.state.read().await.battles.len()
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    /// Seeds one three-beast team per player and returns their team ids.
    pub async fn seed_demo_roster(&self, players: &[&str]) -> Result<Vec<(String, Uuid)>> {
        let ember = demo_move("Ember", ElementType::Fire, 50);
        let torrent = demo_move("Torrent", ElementType::Water, 50);
        let quake = demo_move("Quake", ElementType::Earth, 50);
        let spark = demo_move("Spark", ElementType::Electric, 50);
        let all_moves = [ember.clone(), torrent.clone(), quake.clone(), spark.clone()];
        for mv in all_moves {
            self.insert_move(mv).await;
        }

        let lineup = [
            ("Cinderpaw", ElementType::Fire, 80, ember.id),
            ("Tidefin", ElementType::Water, 60, torrent.id),
            ("Boulderhorn", ElementType::Earth, 55, quake.id),
        ];

        let mut teams = Vec::with_capacity(players.len());
        for player in players {
            let mut beast_ids = Vec::with_capacity(lineup.len());
            for (name, element, power, signature) in lineup {
                let beast = Beast {
                    id: Uuid::new_v4(),
                    owner_id: player.to_string(),
                    name: name.to_string(),
                    element_type: element,
                    health: Health { current: 100, max: 100 },
                    power: Some(power),
                    stamina: Some(100),
                    moves: vec![signature, spark.id],
                };
                beast_ids.push(beast.id);
                self.insert_beast(beast).await?;
            }
            let team = Team {
                id: Uuid::new_v4(),
                owner_id: player.to_string(),
                name: format!("{}'s demo team", player),
                beast_ids,
            };
            teams.push((player.to_string(), team.id));
            self.insert_team(team).await?;
        }
        Ok(teams)
    }
}

fn demo_move(name: &str, element_type: ElementType, damage: i32) -> Move {
    Move {
        id: Uuid::new_v4(),
        name: name.to_string(),
        element_type,
        damage,
        cooldown: 0,
    }
}

#[async_trait::async_trait]
impl RoomStore for MemoryStore {
    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        Ok(self.state.read().await.rooms.get(&room_id).cloned())
    }

    async fn get_room_by_slug(&self, slug: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state.rooms.values().find(|room| room.slug == slug).cloned())
    }

    async fn find_waiting_room(&self, excluding_player: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .values()
            .filter(|room| room.status == RoomStatus::Waiting && room.player1_id != excluding_player)
            .min_by_key(|room| room.created_at)
            .cloned())
    }

    async fn find_waiting_room_owned_by(&self, player_id: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .values()
            .find(|room| room.status == RoomStatus::Waiting && room.player1_id == player_id)
            .cloned())
    }

    async fn find_engaged_room(&self, player_id: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .values()
            .filter(|room| {
                matches!(room.status, RoomStatus::Full | RoomStatus::Active)
                    && (room.player1_id == player_id
                        || room.player2_id.as_deref() == Some(player_id))
            })
            .filter(|room| match room.battle_id {
                None => true,
                Some(battle_id) => state
                    .battles
                    .get(&battle_id)
                    .is_some_and(|battle| battle.status == BattleStatus::Active),
            })
            .max_by_key(|room| room.updated_at)
            .cloned())
    }

    async fn insert_room(&self, room: &Room) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.rooms.values().any(|existing| existing.slug == room.slug) {
            return Ok(false);
        }
        state.rooms.insert(room.id, room.clone());
        Ok(true)
    }

    async fn claim_room(
        &self,
        room_id: Uuid,
        player2_id: &str,
        player2_team_id: Uuid,
    ) -> Result<Option<Room>> {
        let mut state = self.state.write().await;
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Ok(None);
        };
        if room.status != RoomStatus::Waiting || room.player2_id.is_some() {
            return Ok(None);
        }
        room.player2_id = Some(player2_id.to_string());
        room.player2_team_id = Some(player2_team_id);
        room.status = RoomStatus::Full;
        room.updated_at = Utc::now();
        Ok(Some(room.clone()))
    }

    async fn attach_battle(&self, room_id: Uuid, battle_id: Uuid) -> Result<Option<Room>> {
        let mut state = self.state.write().await;
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Ok(None);
        };
        if room.battle_id.is_some() || room.status != RoomStatus::Full {
            return Ok(None);
        }
        room.battle_id = Some(battle_id);
        room.status = RoomStatus::Active;
        room.updated_at = Utc::now();
        Ok(Some(room.clone()))
    }

    async fn delete_waiting_room(&self, room_id: Uuid, owner_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let deletable = state.rooms.get(&room_id).is_some_and(|room| {
            room.status == RoomStatus::Waiting
                && room.player2_id.is_none()
                && room.player1_id == owner_id
        });
        if deletable {
            state.rooms.remove(&room_id);
        }
        Ok(deletable)
    }

    async fn expire_waiting_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<Room>> {
        let mut state = self.state.write().await;
        let expired: Vec<Uuid> = state
            .rooms
            .values()
            .filter(|room| room.status == RoomStatus::Waiting && room.created_at < cutoff)
            .map(|room| room.id)
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|id| state.rooms.remove(&id))
            .collect())
    }
}

#[async_trait::async_trait]
impl BattleStore for MemoryStore {
    async fn get_battle(&self, battle_id: Uuid) -> Result<Option<Battle>> {
        Ok(self.state.read().await.battles.get(&battle_id).cloned())
    }

    async fn insert_battle(&self, battle: &Battle) -> Result<()> {
        let mut state = self.state.write().await;
        if state.battles.contains_key(&battle.id) {
            return Err(AppError::Store(format!("Battle {} already exists", battle.id)));
        }
        state.battles.insert(battle.id, battle.clone());
        Ok(())
    }

    async fn delete_battle(&self, battle_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.battles.remove(&battle_id);
        state.actions.retain(|action| action.battle_id != battle_id);
        Ok(())
    }

    async fn get_team_with_beasts(&self, team_id: Uuid) -> Result<Option<TeamWithBeasts>> {
        let state = self.state.read().await;
        let Some(team) = state.teams.get(&team_id) else {
            return Ok(None);
        };
        let beasts = team
            .beast_ids
            .iter()
            .filter_map(|id| state.beasts.get(id).cloned())
            .collect();
        Ok(Some(TeamWithBeasts {
            team: team.clone(),
            beasts,
        }))
    }

    async fn get_move(&self, move_id: Uuid) -> Result<Option<Move>> {
        Ok(self.state.read().await.moves.get(&move_id).cloned())
    }

    async fn list_battle_actions(&self, battle_id: Uuid) -> Result<Vec<BattleAction>> {
        let state = self.state.read().await;
        let mut actions: Vec<BattleAction> = state
            .actions
            .iter()
            .filter(|action| action.battle_id == battle_id)
            .cloned()
            .collect();
        actions.sort_by_key(|action| action.turn_number);
        Ok(actions)
    }

    async fn commit_turn(&self, commit: &TurnCommit) -> Result<Option<Battle>> {
        let mut state = self.state.write().await;
        let turn_matches = state.battles.get(&commit.battle_id).is_some_and(|battle| {
            battle.current_turn == commit.expected_turn && battle.status == BattleStatus::Active
        });
        if !turn_matches {
            return Ok(None);
        }
        if !state.beasts.contains_key(&commit.target_beast_id) {
            return Err(AppError::BeastNotFound(commit.target_beast_id.to_string()));
        }

        let now = Utc::now();
        if let Some(beast) = state.beasts.get_mut(&commit.target_beast_id) {
            beast.health.current = commit.target_new_health.max(0);
        }

        state.next_action_id += 1;
        let action_id = state.next_action_id;
        let action = &commit.action;
        state.actions.push(BattleAction {
            id: action_id,
            battle_id: action.battle_id,
            player_id: action.player_id.clone(),
            beast_id: action.beast_id,
            move_id: action.move_id,
            target_beast_id: action.target_beast_id,
            damage_dealt: action.damage_dealt,
            is_critical: action.is_critical,
            turn_number: action.turn_number,
            created_at: now,
        });

        let Some(battle) = state.battles.get_mut(&commit.battle_id) else {
            return Ok(None);
        };
        battle.current_turn += 1;
        if let Some(winner) = &commit.winner_id {
            battle.winner_id = Some(winner.clone());
            battle.status = BattleStatus::Completed;
        }
        battle.updated_at = now;
        Ok(Some(battle.clone()))
    }
}
