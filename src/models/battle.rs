use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ==================== ELEMENT ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "element_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    Fire,
    Water,
    Earth,
    Electric,
}

impl ElementType {
    #[cfg(test)]
    pub const ALL: [ElementType; 4] = [
        ElementType::Fire,
        ElementType::Water,
        ElementType::Earth,
        ElementType::Electric,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fire => "FIRE",
            Self::Water => "WATER",
            Self::Earth => "EARTH",
            Self::Electric => "ELECTRIC",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== ROOM ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Full,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub slug: String,
    pub player1_id: String,
    pub player1_team_id: Uuid,
    pub player2_id: Option<String>,
    pub player2_team_id: Option<Uuid>,
    pub status: RoomStatus,
    pub battle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new_waiting(slug: String, player1_id: &str, player1_team_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug,
            player1_id: player1_id.to_string(),
            player1_team_id,
            player2_id: None,
            player2_team_id: None,
            status: RoomStatus::Waiting,
            battle_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==================== BATTLE ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "battle_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BattleStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    pub id: Uuid,
    pub player1_id: String,
    pub player2_id: Option<String>,
    pub player1_team_id: Option<Uuid>,
    pub player2_team_id: Option<Uuid>,
    pub current_turn: i32,
    pub winner_id: Option<String>,
    pub status: BattleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Battle {
    pub fn is_participant(&self, player_id: &str) -> bool {
        self.player1_id == player_id || self.player2_id.as_deref() == Some(player_id)
    }

    /// Team and opponent for `player_id`, `None` while the battle lacks a side.
    pub fn sides_for(&self, player_id: &str) -> Option<(Uuid, &str, Uuid)> {
        let player2_id = self.player2_id.as_deref()?;
        let team1 = self.player1_team_id?;
        let team2 = self.player2_team_id?;
        if self.player1_id == player_id {
            Some((team1, player2_id, team2))
        } else if player2_id == player_id {
            Some((team2, self.player1_id.as_str(), team1))
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.player2_id.is_some() && self.player1_team_id.is_some() && self.player2_team_id.is_some()
    }
}

// ==================== ROSTER ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub id: Uuid,
    pub name: String,
    pub element_type: ElementType,
    pub damage: i32,
    pub cooldown: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beast {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub element_type: ElementType,
    pub health: Health,
    pub power: Option<i32>,
    pub stamina: Option<i32>,
    /// Up to four move ids, slot order preserved.
    pub moves: Vec<Uuid>,
}

impl Beast {
    pub fn is_fainted(&self) -> bool {
        self.health.current <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    /// Up to three beast ids, slot order preserved.
    pub beast_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamWithBeasts {
    pub team: Team,
    pub beasts: Vec<Beast>,
}

impl TeamWithBeasts {
    /// First beast in slot order that can still fight.
    pub fn active_beast(&self) -> Option<&Beast> {
        self.beasts.iter().find(|beast| !beast.is_fainted())
    }

    pub fn beast(&self, beast_id: Uuid) -> Option<&Beast> {
        self.beasts.iter().find(|beast| beast.id == beast_id)
    }
}

// ==================== BATTLE ACTION ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BattleAction {
    pub id: i64,
    pub battle_id: Uuid,
    pub player_id: String,
    pub beast_id: Uuid,
    pub move_id: Uuid,
    pub target_beast_id: Uuid,
    pub damage_dealt: i32,
    pub is_critical: bool,
    pub turn_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBattleAction {
    pub battle_id: Uuid,
    pub player_id: String,
    pub beast_id: Uuid,
    pub move_id: Uuid,
    pub target_beast_id: Uuid,
    pub damage_dealt: i32,
    pub is_critical: bool,
    pub turn_number: i32,
}

/// Everything one resolved turn writes, applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnCommit {
    pub battle_id: Uuid,
    pub expected_turn: i32,
    pub target_beast_id: Uuid,
    pub target_new_health: i32,
    pub winner_id: Option<String>,
    pub action: NewBattleAction,
}
