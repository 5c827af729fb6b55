use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::*,
    store::{BattleStore, RoomStore},
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not configured"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // migrations live at the crate root: ./migrations
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(FromRow)]
struct BeastRow {
    id: Uuid,
    owner_id: String,
    name: String,
    element_type: ElementType,
    health_current: i32,
    health_max: i32,
    power: Option<i32>,
    stamina: Option<i32>,
    move1_id: Option<Uuid>,
    move2_id: Option<Uuid>,
    move3_id: Option<Uuid>,
    move4_id: Option<Uuid>,
}

impl From<BeastRow> for Beast {
    fn from(row: BeastRow) -> Self {
        Beast {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            element_type: row.element_type,
            health: Health {
                current: row.health_current,
                max: row.health_max,
            },
            power: row.power,
            stamina: row.stamina,
            moves: [row.move1_id, row.move2_id, row.move3_id, row.move4_id]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

#[derive(FromRow)]
struct TeamRow {
    id: Uuid,
    owner_id: String,
    name: String,
    beast1_id: Option<Uuid>,
    beast2_id: Option<Uuid>,
    beast3_id: Option<Uuid>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            beast_ids: [row.beast1_id, row.beast2_id, row.beast3_id]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

// ==================== ROOM QUERIES ====================
#[async_trait::async_trait]
impl RoomStore for Database {
    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    async fn get_room_by_slug(&self, slug: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    async fn find_waiting_room(&self, excluding_player: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT * FROM rooms
             WHERE status = 'waiting' AND player1_id <> $1
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(excluding_player)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn find_waiting_room_owned_by(&self, player_id: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT * FROM rooms
             WHERE status = 'waiting' AND player1_id = $1
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn find_engaged_room(&self, player_id: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT r.* FROM rooms r
            LEFT JOIN battles b ON b.id = r.battle_id
            WHERE r.status IN ('full', 'active')
              AND (r.player1_id = $1 OR r.player2_id = $1)
              AND (r.battle_id IS NULL OR b.status = 'ACTIVE')
            ORDER BY r.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn insert_room(&self, room: &Room) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO rooms
                (id, slug, player1_id, player1_team_id, player2_id, player2_team_id,
                 status, battle_id, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(room.id)
        .bind(&room.slug)
        .bind(&room.player1_id)
        .bind(room.player1_team_id)
        .bind(&room.player2_id)
        .bind(room.player2_team_id)
        .bind(room.status)
        .bind(room.battle_id)
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_room(
        &self,
        room_id: Uuid,
        player2_id: &str,
        player2_team_id: Uuid,
    ) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET player2_id = $2, player2_team_id = $3, status = 'full', updated_at = NOW()
            WHERE id = $1 AND status = 'waiting' AND player2_id IS NULL
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(player2_id)
        .bind(player2_team_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn attach_battle(&self, room_id: Uuid, battle_id: Uuid) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET battle_id = $2, status = 'active', updated_at = NOW()
            WHERE id = $1 AND status = 'full' AND battle_id IS NULL
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(battle_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn delete_waiting_room(&self, room_id: Uuid, owner_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM rooms
             WHERE id = $1 AND player1_id = $2 AND status = 'waiting' AND player2_id IS NULL",
        )
        .bind(room_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn expire_waiting_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            "DELETE FROM rooms
             WHERE status = 'waiting' AND player2_id IS NULL AND created_at < $1
             RETURNING *",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }
}

// ==================== BATTLE QUERIES ====================
#[async_trait::async_trait]
impl BattleStore for Database {
    async fn get_battle(&self, battle_id: Uuid) -> Result<Option<Battle>> {
        let battle = sqlx::query_as::<_, Battle>("SELECT * FROM battles WHERE id = $1")
            .bind(battle_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(battle)
    }

    async fn insert_battle(&self, battle: &Battle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO battles
                (id, player1_id, player2_id, player1_team_id, player2_team_id,
                 current_turn, winner_id, status, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(battle.id)
        .bind(&battle.player1_id)
        .bind(&battle.player2_id)
        .bind(battle.player1_team_id)
        .bind(battle.player2_team_id)
        .bind(battle.current_turn)
        .bind(&battle.winner_id)
        .bind(battle.status)
        .bind(battle.created_at)
        .bind(battle.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_battle(&self, battle_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM battles WHERE id = $1")
            .bind(battle_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_team_with_beasts(&self, team_id: Uuid) -> Result<Option<TeamWithBeasts>> {
        let Some(team_row) = sqlx::query_as::<_, TeamRow>(
            "SELECT id, owner_id, name, beast1_id, beast2_id, beast3_id FROM teams WHERE id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };
        let team = Team::from(team_row);

        let rows = sqlx::query_as::<_, BeastRow>(
            r#"
            SELECT id, owner_id, name, element_type, health_current, health_max,
                   power, stamina, move1_id, move2_id, move3_id, move4_id
            FROM beasts
            WHERE id = ANY($1)
            "#,
        )
        .bind(&team.beast_ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut fetched: Vec<Beast> = rows.into_iter().map(Beast::from).collect();
        let beasts = team
            .beast_ids
            .iter()
            .filter_map(|id| {
                let index = fetched.iter().position(|beast| beast.id == *id)?;
                Some(fetched.swap_remove(index))
            })
            .collect();

        Ok(Some(TeamWithBeasts { team, beasts }))
    }

    async fn get_move(&self, move_id: Uuid) -> Result<Option<Move>> {
        let mv = sqlx::query_as::<_, Move>(
            "SELECT id, name, element_type, damage, cooldown FROM moves WHERE id = $1",
        )
        .bind(move_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(mv)
    }

    async fn list_battle_actions(&self, battle_id: Uuid) -> Result<Vec<BattleAction>> {
        let actions = sqlx::query_as::<_, BattleAction>(
            "SELECT * FROM battle_actions WHERE battle_id = $1 ORDER BY turn_number ASC",
        )
        .bind(battle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(actions)
    }

    async fn commit_turn(&self, commit: &TurnCommit) -> Result<Option<Battle>> {
        let mut tx = self.pool.begin().await?;

        // The turn number is the compare-and-swap token.
        let updated = sqlx::query_as::<_, Battle>(
            r#"
            UPDATE battles
            SET current_turn = current_turn + 1,
                winner_id    = COALESCE($3, winner_id),
                status       = CASE WHEN $3::TEXT IS NULL THEN status
                                    ELSE 'COMPLETED'::battle_status END,
                updated_at   = NOW()
            WHERE id = $1 AND current_turn = $2 AND status = 'ACTIVE'
            RETURNING *
            "#,
        )
        .bind(commit.battle_id)
        .bind(commit.expected_turn)
        .bind(&commit.winner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(battle) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        let beast_update = sqlx::query(
            "UPDATE beasts SET health_current = GREATEST($2, 0) WHERE id = $1",
        )
        .bind(commit.target_beast_id)
        .bind(commit.target_new_health)
        .execute(&mut *tx)
        .await?;
        if beast_update.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(AppError::BeastNotFound(commit.target_beast_id.to_string()));
        }

        let action = &commit.action;
        sqlx::query(
            r#"
            INSERT INTO battle_actions
                (battle_id, player_id, beast_id, move_id, target_beast_id,
                 damage_dealt, is_critical, turn_number)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(action.battle_id)
        .bind(&action.player_id)
        .bind(action.beast_id)
        .bind(action.move_id)
        .bind(action.target_beast_id)
        .bind(action.damage_dealt)
        .bind(action.is_critical)
        .bind(action.turn_number)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(battle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_config, StoreBackend};

    #[tokio::test]
    async fn database_new_returns_error_on_invalid_url() {
        let mut config = test_config();
        config.store_backend = StoreBackend::Postgres;
        config.database_url = Some("not-a-url".to_string());
        let result = Database::new(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn database_new_requires_url() {
        let config = test_config();
        assert!(Database::new(&config).await.is_err());
    }

    #[test]
    fn beast_row_keeps_move_slot_order() {
        let first = Uuid::new_v4();
        let third = Uuid::new_v4();
        let beast = Beast::from(BeastRow {
            id: Uuid::new_v4(),
            owner_id: "alice".to_string(),
            name: "Cinderpaw".to_string(),
            element_type: ElementType::Fire,
            health_current: 40,
            health_max: 100,
            power: None,
            stamina: None,
            move1_id: Some(first),
            move2_id: None,
            move3_id: Some(third),
            move4_id: None,
        });
        assert_eq!(beast.moves, vec![first, third]);
        assert_eq!(beast.health.current, 40);
    }
}
