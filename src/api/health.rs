use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub database: String,
    pub redis: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_status = match &state.db {
        Some(db) if db.pool().acquire().await.is_ok() => "connected",
        Some(_) => "disconnected",
        None => "not_configured",
    };

    let redis_status = match &state.redis {
        Some(manager) => {
            let mut conn = manager.clone();
            match redis::cmd("PING").query_async::<String>(&mut conn).await {
                Ok(_) => "connected",
                Err(_) => "disconnected",
            }
        }
        None => "not_configured",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.config.store_backend.as_str().to_string(),
        database: db_status.to_string(),
        redis: redis_status.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::memory_state;

    #[tokio::test]
    async fn memory_backend_reports_unconfigured_dependencies() {
        let (state, _, _) = memory_state(&[]).await;
        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "memory");
        assert_eq!(health.database, "not_configured");
        assert_eq!(health.redis, "not_configured");
    }
}
