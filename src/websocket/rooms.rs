use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, timeout, Duration};
use uuid::Uuid;

use crate::{
    api::AppState,
    constants::{WS_CLIENT_TIMEOUT_SECS, WS_HEARTBEAT_INTERVAL_SECS},
    error::AppError,
    models::Room,
    services::room_feed::{RemovalReason, RoomEvent},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSocketQuery {
    pub player_id: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RoomMessage {
    RoomUpdate {
        room: Room,
    },
    BattleReady {
        #[serde(rename = "battleId")]
        battle_id: Uuid,
    },
    RoomClosed {
        reason: String,
    },
    Error {
        message: String,
    },
}

impl RoomMessage {
    fn to_text(&self) -> Message {
        Message::Text(serde_json::to_string(self).unwrap_or_default().into())
    }
}

fn removal_label(reason: RemovalReason) -> &'static str {
    match reason {
        RemovalReason::Cancelled => "cancelled",
        RemovalReason::Expired => "expired",
    }
}

/// GET /ws/rooms/{slug}?playerId=
///
/// Pushes room updates to one side of a room until its battle exists.
pub async fn handler(
    ws: WebSocketUpgrade,
    Path(slug): Path<String>,
    Query(query): Query<RoomSocketQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, slug, query.player_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, slug: String, player_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let room = match state.matchmaking.get_room(&slug).await {
        Ok(room) => room,
        Err(err) => {
            let closed = match err {
                AppError::RoomNotFound(_) => RoomMessage::RoomClosed {
                    reason: "not_found".to_string(),
                },
                other => RoomMessage::Error {
                    message: other.to_string(),
                },
            };
            let _ = sender.send(closed.to_text()).await;
            return;
        }
    };

    let mut events = state.feed.subscribe(room.id).await;
    if sender
        .send(RoomMessage::RoomUpdate { room: room.clone() }.to_text())
        .await
        .is_err()
    {
        return;
    }

    let matchmaking = state.matchmaking.clone();
    let feed = state.feed.clone();
    let room_id = room.id;
    let wait_budget = Duration::from_secs(state.config.room_wait_timeout_secs);
    let watched_slug = slug.clone();

    let mut send_task = tokio::spawn(async move {
        let waiter = async {
            loop {
                match matchmaking
                    .wait_for_battle(&watched_slug, &player_id, wait_budget)
                    .await
                {
                    Ok(Some(battle_id)) => return Ok(battle_id),
                    Ok(None) => continue,
                    Err(err) => return Err(err),
                }
            }
        };
        tokio::pin!(waiter);
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                result = &mut waiter => {
                    let message = match result {
                        Ok(battle_id) => RoomMessage::BattleReady { battle_id },
                        Err(AppError::RoomNotFound(_)) => RoomMessage::RoomClosed {
                            reason: "removed".to_string(),
                        },
                        Err(err) => RoomMessage::Error { message: err.to_string() },
                    };
                    let _ = sender.send(message.to_text()).await;
                    break;
                }
                event = events.recv() => match event {
                    Ok(RoomEvent::Updated { room }) => {
                        if sender.send(RoomMessage::RoomUpdate { room }.to_text()).await.is_err() {
                            break;
                        }
                    }
                    Ok(RoomEvent::Removed { reason, .. }) => {
                        let closed = RoomMessage::RoomClosed {
                            reason: removal_label(reason).to_string(),
                        };
                        let _ = sender.send(closed.to_text()).await;
                        break;
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        events = feed.subscribe(room_id).await;
                    }
                },
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        loop {
            let next_msg = timeout(Duration::from_secs(WS_CLIENT_TIMEOUT_SECS), receiver.next()).await;
            let msg = match next_msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    tracing::info!("WebSocket client timeout");
                    break;
                }
            };

            match msg {
                Message::Close(_) => break,
                Message::Text(text) => tracing::debug!("Ignoring room socket message: {}", text),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::debug!("Room socket closed for {}", slug);
}
