use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod error;
mod models;
mod services;
mod store;
mod websocket;

use config::{Config, StoreBackend};
use constants::API_VERSION;
use db::Database;
use services::{ChangeFeed, LocalRoomFeed};
use store::{BattleStore, MemoryStore, RoomStore};

const DEMO_PLAYERS: [&str; 2] = ["demo-player-1", "demo-player-2"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beast_arena_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Beast Arena Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);
    tracing::info!("Store backend: {}", config.store_backend.as_str());
    tracing::info!("Team resolution: {:?}", config.team_resolution);

    let (rooms, battles, db): (Arc<dyn RoomStore>, Arc<dyn BattleStore>, Option<Database>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let db = Database::new(&config).await?;
                tracing::info!("Running database migrations...");
                db.run_migrations().await?;
                (Arc::new(db.clone()), Arc::new(db.clone()), Some(db))
            }
            StoreBackend::Memory => {
                let store = MemoryStore::new();
                if config.seed_demo_roster {
                    for (player, team_id) in store.seed_demo_roster(&DEMO_PLAYERS).await? {
                        tracing::info!("Seeded demo team {} for {}", team_id, player);
                    }
                }
                (Arc::new(store.clone()), Arc::new(store), None)
            }
        };

    // Redis is optional; without it the join limiter fails open.
    let redis = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            match redis::aio::ConnectionManager::new(client).await {
                Ok(manager) => Some(manager),
                Err(e) => {
                    tracing::warn!("Redis unavailable, join rate limiting disabled: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let feed: Arc<dyn ChangeFeed> = Arc::new(LocalRoomFeed::new());
    let app_state = api::AppState::new(
        config.clone(),
        rooms.clone(),
        battles,
        feed.clone(),
        db,
        redis,
    );

    // Build router
    let app = build_router(app_state);

    // Start background services
    tokio::spawn(services::start_background_services(
        rooms,
        feed,
        config.clone(),
    ));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Matchmaking
        .route("/api/v1/matchmaking/join", post(api::matchmaking::join))
        .route("/api/v1/matchmaking/cancel", post(api::matchmaking::cancel))
        .route(
            "/api/v1/matchmaking/rooms/{slug}",
            get(api::matchmaking::get_room),
        )
        .route(
            "/api/v1/matchmaking/rooms/{slug}/wait",
            get(api::matchmaking::wait_for_battle),
        )
        // Battle
        .route("/api/v1/battle/move", post(api::battle::apply_move))
        .route("/api/v1/battle/{id}", get(api::battle::get_battle))
        .route("/api/v1/battle/{id}/actions", get(api::battle::get_actions))
        // WebSocket endpoints
        .route("/ws/rooms/{slug}", get(websocket::rooms::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
