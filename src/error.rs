use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Battle not found: {0}")]
    BattleNotFound(String),

    #[error("Beast not found: {0}")]
    BeastNotFound(String),

    #[error("Move not found: {0}")]
    MoveNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Battle already completed")]
    BattleCompleted,

    #[error("Battle is missing a second player or team")]
    BattleIncomplete,

    #[error("Room already claimed")]
    RoomAlreadyClaimed,

    #[error("Room is still waiting for an opponent")]
    RoomNotReady,

    #[error("Turn was already resolved by another request")]
    StaleTurn,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::RoomNotFound(_) => (StatusCode::NOT_FOUND, "ROOM_NOT_FOUND"),
            AppError::BattleNotFound(_) => (StatusCode::NOT_FOUND, "BATTLE_NOT_FOUND"),
            AppError::BeastNotFound(_) => (StatusCode::NOT_FOUND, "BEAST_NOT_FOUND"),
            AppError::MoveNotFound(_) => (StatusCode::NOT_FOUND, "MOVE_NOT_FOUND"),
            AppError::TeamNotFound(_) => (StatusCode::NOT_FOUND, "TEAM_NOT_FOUND"),
            AppError::NotYourTurn => (StatusCode::CONFLICT, "NOT_YOUR_TURN"),
            AppError::BattleCompleted => (StatusCode::CONFLICT, "BATTLE_COMPLETED"),
            AppError::BattleIncomplete => (StatusCode::CONFLICT, "BATTLE_INCOMPLETE"),
            AppError::RoomAlreadyClaimed => (StatusCode::CONFLICT, "ROOM_ALREADY_CLAIMED"),
            AppError::RoomNotReady => (StatusCode::CONFLICT, "ROOM_NOT_READY"),
            AppError::StaleTurn => (StatusCode::CONFLICT, "STALE_TURN"),
            AppError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            AppError::Database(_) | AppError::Redis(_) | AppError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_family_maps_to_409() {
        for err in [
            AppError::NotYourTurn,
            AppError::BattleCompleted,
            AppError::BattleIncomplete,
            AppError::RoomAlreadyClaimed,
            AppError::RoomNotReady,
            AppError::StaleTurn,
        ] {
            assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
        }
    }

    #[test]
    fn not_found_family_maps_to_404() {
        assert_eq!(
            AppError::BattleNotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::MoveNotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn store_errors_map_to_500() {
        let (status, code) = AppError::Store("down".into()).status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "STORE_ERROR");
    }

    #[test]
    fn validation_maps_to_400() {
        let response = AppError::BadRequest("missing playerId".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
