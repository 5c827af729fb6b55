use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use uuid::Uuid;

use super::{parse_uuid, AppState};
use crate::{
    error::Result,
    models::{ApiResponse, Room},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub player_id: String,
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub player_id: String,
    pub room_slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    pub player_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_id: Option<Uuid>,
    pub room_slug: String,
    pub waiting: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
}

/// POST /api/v1/matchmaking/join
pub async fn join(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<ApiResponse<MatchResponse>>> {
    let team_id = parse_uuid("teamId", &req.team_id)?;
    state.join_limiter.check(&req.player_id).await?;

    let outcome = state
        .matchmaking
        .join_or_create(&req.player_id, team_id)
        .await?;

    Ok(Json(ApiResponse::success(MatchResponse {
        battle_id: outcome.battle_id,
        room_slug: outcome.room_slug,
        waiting: outcome.waiting,
    })))
}

/// POST /api/v1/matchmaking/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ApiResponse<CancelResponse>>> {
    state
        .matchmaking
        .cancel_wait(&req.player_id, &req.room_slug)
        .await?;
    Ok(Json(ApiResponse::success(CancelResponse { ok: true })))
}

/// GET /api/v1/matchmaking/rooms/{slug}
pub async fn get_room(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Room>>> {
    let room = state.matchmaking.get_room(&slug).await?;
    Ok(Json(ApiResponse::success(room)))
}

/// GET /api/v1/matchmaking/rooms/{slug}/wait?playerId=
///
/// Long-poll until the room has a battle or the wait budget runs out.
pub async fn wait_for_battle(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<ApiResponse<MatchResponse>>> {
    let timeout = Duration::from_secs(state.config.room_wait_timeout_secs);
    let battle_id = state
        .matchmaking
        .wait_for_battle(&slug, &query.player_id, timeout)
        .await?;

    Ok(Json(ApiResponse::success(MatchResponse {
        battle_id,
        room_slug: slug,
        waiting: battle_id.is_none(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::memory_state;
    use crate::error::AppError;

    fn join_request(player: &str, team: Uuid) -> Json<JoinRequest> {
        Json(JoinRequest {
            player_id: player.to_string(),
            team_id: team.to_string(),
        })
    }

    #[tokio::test]
    async fn join_pairs_two_players_into_one_battle() {
        let (state, _, teams) = memory_state(&["alice", "bob"]).await;

        let Json(first) = join(State(state.clone()), join_request("alice", teams[0].1))
            .await
            .unwrap();
        assert!(first.data.waiting);
        assert!(first.data.battle_id.is_none());

        let Json(second) = join(State(state.clone()), join_request("bob", teams[1].1))
            .await
            .unwrap();
        assert!(!second.data.waiting);
        assert_eq!(second.data.room_slug, first.data.room_slug);

        let Json(polled) = wait_for_battle(
            State(state),
            Path(first.data.room_slug.clone()),
            Query(WaitQuery {
                player_id: "alice".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(polled.data.battle_id, second.data.battle_id);
        assert!(!polled.data.waiting);
    }

    #[tokio::test]
    async fn join_rejects_malformed_team_id() {
        let (state, _, _) = memory_state(&["alice"]).await;
        let err = join(
            State(state),
            Json(JoinRequest {
                player_id: "alice".to_string(),
                team_id: "team-one".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn cancel_then_lookup_reports_room_gone() {
        let (state, _, teams) = memory_state(&["alice"]).await;
        let Json(opened) = join(State(state.clone()), join_request("alice", teams[0].1))
            .await
            .unwrap();
        let slug = opened.data.room_slug;

        let Json(room) = get_room(State(state.clone()), Path(slug.clone())).await.unwrap();
        assert_eq!(room.data.player1_id, "alice");

        let Json(cancelled) = cancel(
            State(state.clone()),
            Json(CancelRequest {
                player_id: "alice".to_string(),
                room_slug: slug.clone(),
            }),
        )
        .await
        .unwrap();
        assert!(cancelled.data.ok);

        let err = get_room(State(state), Path(slug)).await.unwrap_err();
        assert!(matches!(err, AppError::RoomNotFound(_)));
    }

    #[test]
    fn match_response_omits_missing_battle_id() {
        let json = serde_json::to_value(MatchResponse {
            battle_id: None,
            room_slug: "misty-otter-0007".to_string(),
            waiting: true,
        })
        .unwrap();
        assert!(json.get("battleId").is_none());
        assert_eq!(json["roomSlug"], "misty-otter-0007");
    }
}
