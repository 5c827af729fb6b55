use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::{
    config::TeamResolution,
    constants::{FIRST_TURN, SLUG_INSERT_ATTEMPTS},
    error::{AppError, Result},
    models::{Battle, BattleStatus, Room, RoomStatus},
    services::room_feed::{ChangeFeed, RemovalReason, RoomEvent},
    store::{BattleStore, RoomStore},
};

const SLUG_ADJECTIVES: [&str; 12] = [
    "blazing", "tidal", "mossy", "static", "molten", "misty", "rocky", "charged", "ashen",
    "frosted", "rumbling", "sparking",
];
const SLUG_CREATURES: [&str; 12] = [
    "otter", "drake", "lynx", "golem", "viper", "heron", "badger", "wisp", "mantis", "yak",
    "salamander", "kraken",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub room_id: Uuid,
    pub room_slug: String,
    pub battle_id: Option<Uuid>,
    pub waiting: bool,
}

pub struct MatchmakingCoordinator {
    rooms: Arc<dyn RoomStore>,
    battles: Arc<dyn BattleStore>,
    feed: Arc<dyn ChangeFeed>,
    team_resolution: TeamResolution,
    recheck_interval: Duration,
}

pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    let adjective = SLUG_ADJECTIVES[rng.random_range(0..SLUG_ADJECTIVES.len())];
    let creature = SLUG_CREATURES[rng.random_range(0..SLUG_CREATURES.len())];
    let suffix: u16 = rng.random_range(0..10_000);
    format!("{}-{}-{:04}", adjective, creature, suffix)
}

fn require_player_id(player_id: &str) -> Result<&str> {
    let trimmed = player_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("playerId is required".to_string()));
    }
    Ok(trimmed)
}

impl MatchmakingCoordinator {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        battles: Arc<dyn BattleStore>,
        feed: Arc<dyn ChangeFeed>,
        team_resolution: TeamResolution,
        recheck_interval: Duration,
    ) -> Self {
        Self {
            rooms,
            battles,
            feed,
            team_resolution,
            recheck_interval,
        }
    }

    /// Claims a waiting room as player 2 or opens a new one as player 1.
    ///
    /// A lost claim race is not an error: the loser opens a fresh room.
    pub async fn join_or_create(&self, player_id: &str, team_id: Uuid) -> Result<JoinOutcome> {
        let player_id = require_player_id(player_id)?;

        if let Some(engaged) = self.rooms.find_engaged_room(player_id).await? {
            tracing::debug!(
                "Player {} is already matched in room {}",
                player_id,
                engaged.slug
            );
            let battle_id = match engaged.battle_id {
                Some(battle_id) => battle_id,
                None => self.create_battle_for_room(engaged.id).await?,
            };
            return Ok(JoinOutcome {
                room_id: engaged.id,
                room_slug: engaged.slug,
                battle_id: Some(battle_id),
                waiting: false,
            });
        }

        if let Some(existing) = self.rooms.find_waiting_room_owned_by(player_id).await? {
            tracing::debug!(
                "Player {} already waiting in room {}",
                player_id,
                existing.slug
            );
            return Ok(JoinOutcome {
                room_id: existing.id,
                room_slug: existing.slug,
                battle_id: None,
                waiting: true,
            });
        }

        self.check_team_for_join(player_id, team_id).await?;

        if let Some(candidate) = self.rooms.find_waiting_room(player_id).await? {
            match self.rooms.claim_room(candidate.id, player_id, team_id).await? {
                Some(room) => {
                    tracing::info!(
                        "Player {} claimed room {} from {}",
                        player_id,
                        room.slug,
                        room.player1_id
                    );
                    self.feed
                        .publish(RoomEvent::Updated { room: room.clone() })
                        .await;
                    let battle_id = self.create_battle_for_room(room.id).await?;
                    return Ok(JoinOutcome {
                        room_id: room.id,
                        room_slug: room.slug,
                        battle_id: Some(battle_id),
                        waiting: false,
                    });
                }
                None => {
                    tracing::debug!(
                        "Player {} lost claim race for room {}; opening a new room",
                        player_id,
                        candidate.slug
                    );
                }
            }
        }

        let room = self.open_room(player_id, team_id).await?;
        Ok(JoinOutcome {
            room_id: room.id,
            room_slug: room.slug,
            battle_id: None,
            waiting: true,
        })
    }

    async fn open_room(&self, player_id: &str, team_id: Uuid) -> Result<Room> {
        for attempt in 1..=SLUG_INSERT_ATTEMPTS {
            let room = Room::new_waiting(generate_slug(), player_id, team_id);
            if self.rooms.insert_room(&room).await? {
                tracing::info!("Player {} opened room {}", player_id, room.slug);
                return Ok(room);
            }
            tracing::debug!("Slug collision on {} (attempt {})", room.slug, attempt);
        }
        Err(AppError::Store(format!(
            "Could not allocate a room slug after {} attempts",
            SLUG_INSERT_ATTEMPTS
        )))
    }

    /// Creates the battle for a full room exactly once and returns its id.
    ///
    /// Safe to call concurrently from both sides of the room; every caller
    /// gets the id of the battle that won the attach.
    pub async fn create_battle_for_room(&self, room_id: Uuid) -> Result<Uuid> {
        let room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
        if let Some(battle_id) = room.battle_id {
            return Ok(battle_id);
        }
        if room.status == RoomStatus::Waiting {
            return Err(AppError::RoomNotReady);
        }
        let player2_id = room.player2_id.clone().ok_or(AppError::RoomNotReady)?;

        let player1_team_id = self
            .resolve_team(&room.player1_id, Some(room.player1_team_id))
            .await?;
        let player2_team_id = self.resolve_team(&player2_id, room.player2_team_id).await?;

        let now = Utc::now();
        let battle = Battle {
            id: Uuid::new_v4(),
            player1_id: room.player1_id.clone(),
            player2_id: Some(player2_id),
            player1_team_id,
            player2_team_id,
            current_turn: FIRST_TURN,
            winner_id: None,
            status: BattleStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.battles.insert_battle(&battle).await?;

        match self.rooms.attach_battle(room.id, battle.id).await? {
            Some(updated) => {
                tracing::info!("Battle {} created for room {}", battle.id, updated.slug);
                self.feed.publish(RoomEvent::Updated { room: updated }).await;
                Ok(battle.id)
            }
            None => {
                tracing::debug!(
                    "Room {} already has a battle; discarding {}",
                    room.slug,
                    battle.id
                );
                if let Err(err) = self.battles.delete_battle(battle.id).await {
                    tracing::warn!("Failed to discard orphan battle {}: {}", battle.id, err);
                }
                self.rooms
                    .get_room(room.id)
                    .await?
                    .and_then(|current| current.battle_id)
                    .ok_or_else(|| {
                        AppError::Store(format!("Room {} lost its battle attachment", room.slug))
                    })
            }
        }
    }

    /// Deletes a room that is still waiting and owned by `player_id`.
    pub async fn cancel_wait(&self, player_id: &str, room_slug: &str) -> Result<()> {
        let player_id = require_player_id(player_id)?;
        let room = self
            .rooms
            .get_room_by_slug(room_slug.trim())
            .await?
            .ok_or_else(|| AppError::RoomNotFound(room_slug.to_string()))?;
        if room.player1_id != player_id {
            return Err(AppError::BadRequest(
                "Only the player who opened the room can cancel it".to_string(),
            ));
        }
        if !self.rooms.delete_waiting_room(room.id, player_id).await? {
            return Err(AppError::RoomAlreadyClaimed);
        }

        tracing::info!("Player {} cancelled room {}", player_id, room.slug);
        self.feed
            .publish(RoomEvent::Removed {
                room_id: room.id,
                reason: RemovalReason::Cancelled,
            })
            .await;
        Ok(())
    }

    pub async fn get_room(&self, room_slug: &str) -> Result<Room> {
        self.rooms
            .get_room_by_slug(room_slug.trim())
            .await?
            .ok_or_else(|| AppError::RoomNotFound(room_slug.to_string()))
    }

    /// Waits until the room has a battle, creating it if the room filled up.
    ///
    /// Returns `None` when `timeout` elapses first. Listens on the change
    /// feed and re-reads the room every recheck interval, so fills made by
    /// another process are picked up too.
    pub async fn wait_for_battle(
        &self,
        room_slug: &str,
        player_id: &str,
        timeout: Duration,
    ) -> Result<Option<Uuid>> {
        let player_id = require_player_id(player_id)?;
        let room = self.get_room(room_slug).await?;
        if room.player1_id != player_id && room.player2_id.as_deref() != Some(player_id) {
            return Err(AppError::BadRequest(
                "Player is not part of this room".to_string(),
            ));
        }

        // Subscribe before the first re-read so no transition slips between them.
        let mut events = self.feed.subscribe(room.id).await;
        let mut recheck = tokio::time::interval(self.recheck_interval);
        let deadline = tokio::time::sleep_until(Instant::now() + timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(None),
                _ = recheck.tick() => {
                    if let Some(battle_id) = self.reread_for_battle(room.id).await? {
                        return Ok(Some(battle_id));
                    }
                }
                event = events.recv() => match event {
                    Ok(RoomEvent::Updated { room: current }) => {
                        if let Some(battle_id) = self.battle_for(&current).await? {
                            return Ok(Some(battle_id));
                        }
                    }
                    Ok(RoomEvent::Removed { .. }) => {
                        return Err(AppError::RoomNotFound(room.slug.clone()));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Room {} feed lagged by {} events", room.slug, skipped);
                        if let Some(battle_id) = self.reread_for_battle(room.id).await? {
                            return Ok(Some(battle_id));
                        }
                    }
                    Err(RecvError::Closed) => {
                        events = self.feed.subscribe(room.id).await;
                    }
                },
            }
        }
    }

    async fn reread_for_battle(&self, room_id: Uuid) -> Result<Option<Uuid>> {
        let current = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
        self.battle_for(&current).await
    }

    async fn battle_for(&self, room: &Room) -> Result<Option<Uuid>> {
        if let Some(battle_id) = room.battle_id {
            return Ok(Some(battle_id));
        }
        if room.status == RoomStatus::Full {
            return self.create_battle_for_room(room.id).await.map(Some);
        }
        Ok(None)
    }

    /// A team owned by someone else, or with no beast left standing, is
    /// always refused. Only a team that cannot be looked up is tolerated in
    /// lenient mode.
    async fn check_team_for_join(&self, player_id: &str, team_id: Uuid) -> Result<()> {
        let team = match self.battles.get_team_with_beasts(team_id).await {
            Ok(Some(team)) => team,
            Ok(None) if self.team_resolution == TeamResolution::Lenient => {
                tracing::warn!(
                    "Team {} for player {} not found; joining anyway",
                    team_id,
                    player_id
                );
                return Ok(());
            }
            Ok(None) => {
                return Err(AppError::TeamNotFound(format!(
                    "{} for player {}",
                    team_id, player_id
                )))
            }
            Err(err) if self.team_resolution == TeamResolution::Lenient => {
                tracing::warn!(
                    "Team {} lookup failed for player {} ({}); joining anyway",
                    team_id,
                    player_id,
                    err
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if team.team.owner_id != player_id {
            return Err(AppError::TeamNotFound(format!(
                "{} for player {}",
                team_id, player_id
            )));
        }
        if team.active_beast().is_none() {
            return Err(AppError::BadRequest(format!(
                "Team {} has no beast able to fight",
                team.team.name
            )));
        }
        Ok(())
    }

    /// Lenient mode keeps the requested id so the team can still resolve at move time.
    async fn resolve_team(&self, player_id: &str, team_id: Option<Uuid>) -> Result<Option<Uuid>> {
        let Some(team_id) = team_id else {
            return match self.team_resolution {
                TeamResolution::Strict => Err(AppError::TeamNotFound(format!(
                    "no team selected by {}",
                    player_id
                ))),
                TeamResolution::Lenient => {
                    tracing::warn!("Player {} has no team; creating battle anyway", player_id);
                    Ok(None)
                }
            };
        };

        let problem = match self.battles.get_team_with_beasts(team_id).await {
            Ok(Some(team)) if team.team.owner_id == player_id => return Ok(Some(team_id)),
            Ok(Some(_)) => {
                return Err(AppError::TeamNotFound(format!(
                    "{} for player {} (team belongs to another player)",
                    team_id, player_id
                )))
            }
            Ok(None) => "team not found".to_string(),
            Err(err) if self.team_resolution == TeamResolution::Lenient => err.to_string(),
            Err(err) => return Err(err),
        };

        match self.team_resolution {
            TeamResolution::Strict => Err(AppError::TeamNotFound(format!(
                "{} for player {} ({})",
                team_id, player_id, problem
            ))),
            TeamResolution::Lenient => {
                tracing::warn!(
                    "Team {} for player {} did not resolve ({}); creating battle anyway",
                    team_id,
                    player_id,
                    problem
                );
                Ok(Some(team_id))
            }
        }
    }
}
