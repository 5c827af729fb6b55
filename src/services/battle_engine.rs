use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Battle, BattleAction, BattleStatus, NewBattleAction, TeamWithBeasts, TurnCommit},
    services::{
        damage_resolver::{self, RandomSource, SystemRandom},
        turn_validator,
    },
    store::BattleStore,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub damage: i32,
    pub new_hp: i32,
    pub is_critical: bool,
    pub type_multiplier: f64,
    pub winner: Option<String>,
    pub move_used: String,
    pub attacker_name: String,
    pub target_name: String,
    pub battle: Battle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub battle: Battle,
    pub player_on_turn: Option<String>,
    pub player1_team: Option<TeamWithBeasts>,
    pub player2_team: Option<TeamWithBeasts>,
}

/// Drives one battle turn at a time. The store's turn compare-and-swap is
/// the only serialization point, so any number of engines may share a store.
pub struct BattleEngine {
    battles: Arc<dyn BattleStore>,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl BattleEngine {
    pub fn new(battles: Arc<dyn BattleStore>) -> Self {
        Self::with_random(battles, Box::new(SystemRandom::new()))
    }

    pub fn with_random(battles: Arc<dyn BattleStore>, rng: Box<dyn RandomSource>) -> Self {
        Self {
            battles,
            rng: Mutex::new(rng),
        }
    }

    pub async fn apply_move(
        &self,
        battle_id: Uuid,
        player_id: &str,
        move_id: Uuid,
        target_beast_id: Uuid,
    ) -> Result<MoveOutcome> {
        let player_id = player_id.trim();
        if player_id.is_empty() {
            return Err(AppError::BadRequest("playerId is required".to_string()));
        }

        let battle = self.load_battle(battle_id).await?;
        if battle.status == BattleStatus::Completed {
            return Err(AppError::BattleCompleted);
        }
        if !battle.is_complete() {
            return Err(AppError::BattleIncomplete);
        }
        if !battle.is_participant(player_id) {
            return Err(AppError::BadRequest(
                "Player is not part of this battle".to_string(),
            ));
        }
        if !turn_validator::is_players_turn(&battle, player_id) {
            return Err(AppError::NotYourTurn);
        }
        let (own_team_id, opponent_id, opponent_team_id) = battle
            .sides_for(player_id)
            .ok_or(AppError::BattleIncomplete)?;

        let own_team = self.load_team(own_team_id).await?;
        let opponent_team = self.load_team(opponent_team_id).await?;
        if own_team.team.owner_id != player_id {
            return Err(AppError::TeamNotFound(format!(
                "{} for player {}",
                own_team_id, player_id
            )));
        }
        if opponent_team.team.owner_id != opponent_id {
            return Err(AppError::TeamNotFound(format!(
                "{} for player {}",
                opponent_team_id, opponent_id
            )));
        }

        let attacker = own_team.active_beast().ok_or_else(|| {
            AppError::BeastNotFound(format!("no beast left to fight on team {}", own_team_id))
        })?;
        let target = opponent_team
            .beast(target_beast_id)
            .ok_or_else(|| AppError::BeastNotFound(target_beast_id.to_string()))?;
        if target.is_fainted() {
            return Err(AppError::BadRequest(format!(
                "{} has already fainted",
                target.name
            )));
        }

        let mv = self
            .battles
            .get_move(move_id)
            .await?
            .ok_or_else(|| AppError::MoveNotFound(move_id.to_string()))?;
        if !attacker.moves.is_empty() && !attacker.moves.contains(&mv.id) {
            return Err(AppError::BadRequest(format!(
                "{} does not know {}",
                attacker.name, mv.name
            )));
        }

        let outcome = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            damage_resolver::resolve(attacker, target, &mv, &mut **rng)
        };
        let new_hp = (target.health.current - outcome.damage).max(0);

        let team_wiped = new_hp <= 0
            && opponent_team
                .beasts
                .iter()
                .all(|beast| beast.id == target.id || beast.is_fainted());
        let winner_id = team_wiped.then(|| player_id.to_string());

        let commit = TurnCommit {
            battle_id: battle.id,
            expected_turn: battle.current_turn,
            target_beast_id: target.id,
            target_new_health: new_hp,
            winner_id: winner_id.clone(),
            action: NewBattleAction {
                battle_id: battle.id,
                player_id: player_id.to_string(),
                beast_id: attacker.id,
                move_id: mv.id,
                target_beast_id: target.id,
                damage_dealt: outcome.damage,
                is_critical: outcome.is_critical,
                turn_number: battle.current_turn,
            },
        };
        let updated = match self.battles.commit_turn(&commit).await? {
            Some(updated) => updated,
            None => {
                tracing::debug!(
                    "Battle {} turn {} already resolved by another request",
                    battle.id,
                    battle.current_turn
                );
                return Err(AppError::StaleTurn);
            }
        };

        tracing::info!(
            "Battle {} turn {}: {}'s {} used {} on {} for {} damage{}",
            battle.id,
            battle.current_turn,
            player_id,
            attacker.name,
            mv.name,
            target.name,
            outcome.damage,
            if outcome.is_critical { " (critical)" } else { "" }
        );
        if let Some(winner) = &winner_id {
            tracing::info!("Battle {} won by {}", battle.id, winner);
        }

        Ok(MoveOutcome {
            damage: outcome.damage,
            new_hp,
            is_critical: outcome.is_critical,
            type_multiplier: outcome.type_multiplier,
            winner: winner_id,
            move_used: mv.name.clone(),
            attacker_name: attacker.name.clone(),
            target_name: target.name.clone(),
            battle: updated,
        })
    }

    pub async fn snapshot(&self, battle_id: Uuid) -> Result<BattleSnapshot> {
        let battle = self.load_battle(battle_id).await?;
        let player1_team = self.optional_team(battle.player1_team_id).await?;
        let player2_team = self.optional_team(battle.player2_team_id).await?;
        let player_on_turn = match battle.status {
            BattleStatus::Active => turn_validator::player_on_turn(&battle).map(str::to_string),
            BattleStatus::Completed => None,
        };
        Ok(BattleSnapshot {
            battle,
            player_on_turn,
            player1_team,
            player2_team,
        })
    }

    pub async fn actions(&self, battle_id: Uuid) -> Result<Vec<BattleAction>> {
        self.load_battle(battle_id).await?;
        self.battles.list_battle_actions(battle_id).await
    }

    async fn load_battle(&self, battle_id: Uuid) -> Result<Battle> {
        self.battles
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| AppError::BattleNotFound(battle_id.to_string()))
    }

    async fn load_team(&self, team_id: Uuid) -> Result<TeamWithBeasts> {
        self.battles
            .get_team_with_beasts(team_id)
            .await?
            .ok_or_else(|| AppError::TeamNotFound(team_id.to_string()))
    }

    async fn optional_team(&self, team_id: Option<Uuid>) -> Result<Option<TeamWithBeasts>> {
        match team_id {
            Some(id) => self.battles.get_team_with_beasts(id).await,
            None => Ok(None),
        }
    }
}
