use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use super::{parse_uuid, AppState};
use crate::{
    error::Result,
    models::{ApiResponse, BattleAction},
    services::battle_engine::{BattleSnapshot, MoveOutcome},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub battle_id: String,
    pub player_id: String,
    pub move_id: String,
    pub target_beast_id: String,
}

/// POST /api/v1/battle/move
pub async fn apply_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ApiResponse<MoveOutcome>>> {
    let battle_id = parse_uuid("battleId", &req.battle_id)?;
    let move_id = parse_uuid("moveId", &req.move_id)?;
    let target_beast_id = parse_uuid("targetBeastId", &req.target_beast_id)?;

    let outcome = state
        .engine
        .apply_move(battle_id, &req.player_id, move_id, target_beast_id)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// GET /api/v1/battle/{id}
pub async fn get_battle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BattleSnapshot>>> {
    let battle_id = parse_uuid("battleId", &id)?;
    let snapshot = state.engine.snapshot(battle_id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// GET /api/v1/battle/{id}/actions
pub async fn get_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<BattleAction>>>> {
    let battle_id = parse_uuid("battleId", &id)?;
    let actions = state.engine.actions(battle_id).await?;
    Ok(Json(ApiResponse::success(actions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::memory_state;
    use crate::error::AppError;
    use crate::store::BattleStore;

    #[tokio::test]
    async fn full_turn_through_the_handlers() {
        let (state, store, teams) = memory_state(&["alice", "bob"]).await;
        state
            .matchmaking
            .join_or_create("alice", teams[0].1)
            .await
            .unwrap();
        let joined = state
            .matchmaking
            .join_or_create("bob", teams[1].1)
            .await
            .unwrap();
        let battle_id = joined.battle_id.unwrap();

        let Json(snapshot) = get_battle(State(state.clone()), Path(battle_id.to_string()))
            .await
            .unwrap();
        assert_eq!(snapshot.data.player_on_turn.as_deref(), Some("alice"));

        let alice_team = store.get_team_with_beasts(teams[0].1).await.unwrap().unwrap();
        let bob_team = store.get_team_with_beasts(teams[1].1).await.unwrap().unwrap();
        let attacker = alice_team.active_beast().unwrap();

        let Json(outcome) = apply_move(
            State(state.clone()),
            Json(MoveRequest {
                battle_id: battle_id.to_string(),
                player_id: "alice".to_string(),
                move_id: attacker.moves[0].to_string(),
                target_beast_id: bob_team.beasts[0].id.to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(outcome.data.battle.current_turn, 2);
        assert_eq!(outcome.data.attacker_name, attacker.name);

        let Json(actions) = get_actions(State(state), Path(battle_id.to_string()))
            .await
            .unwrap();
        assert_eq!(actions.data.len(), 1);
        assert_eq!(actions.data[0].player_id, "alice");
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_the_engine() {
        let (state, _, _) = memory_state(&[]).await;
        let err = get_battle(State(state.clone()), Path("42".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = apply_move(
            State(state),
            Json(MoveRequest {
                battle_id: uuid::Uuid::new_v4().to_string(),
                player_id: "alice".to_string(),
                move_id: "ember".to_string(),
                target_beast_id: uuid::Uuid::new_v4().to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
