//! Per-thread realtime WebSocket endpoint.
//!
//! Authentication happens during the HTTP handshake from the access
//! cookie; the transparent-refresh path does not apply here, so a client
//! with an expired access token must hit any API endpoint first. Only
//! thread members may subscribe (admins bypass).

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::info;

use crate::auth::{ACCESS_COOKIE_NAME, get_cookie};
use crate::db::{Database, Role};
use crate::events::{EventHub, ThreadEvent};
use crate::jwt::JwtConfig;

const PING_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct EventsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub events: EventHub,
}

pub fn router(state: EventsState) -> Router {
    Router::new()
        .route("/threads/{uuid}/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    State(state): State<EventsState>,
    Path(uuid): Path<String>,
    headers: axum::http::HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = match get_cookie(&headers, ACCESS_COOKIE_NAME) {
        Some(token) => token,
        None => return (StatusCode::UNAUTHORIZED, "Not authenticated").into_response(),
    };

    let claims = match state.jwt.validate_access_token(token) {
        Ok(claims) => claims,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
        }
    };

    let profile = match state.db.profiles().get_by_uuid(&claims.sub).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "Profile not found").into_response(),
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let thread = match state.db.threads().get_by_uuid(&uuid).await {
        Ok(Some(thread)) => thread,
        Ok(None) => return (StatusCode::NOT_FOUND, "Thread not found").into_response(),
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    if profile.role != Role::Admin {
        match state.db.threads().is_member(thread.id, profile.id).await {
            Ok(true) => {}
            Ok(false) => {
                return (StatusCode::FORBIDDEN, "Not a member of this thread").into_response();
            }
            Err(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
            }
        }
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "Expected WebSocket upgrade").into_response();
        }
    };

    let events = state.events.clone();
    let username = profile.username;
    ws.on_upgrade(move |socket| handle_socket(socket, events, thread.id, username))
}

async fn handle_socket(socket: WebSocket, events: EventHub, thread_id: i64, username: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = events.subscribe(thread_id);

    // Forward thread events and periodic pings to the client.
    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(tokio::time::Duration::from_secs(PING_INTERVAL_SECS));
        ping.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let event: ThreadEvent = match event {
                        Ok(event) => event,
                        // Lagged: skip ahead rather than disconnect
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    };
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Drain the client side; only Close matters.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut recv_task => {},
    }

    send_task.abort();
    recv_task.abort();

    info!(thread = thread_id, user = %username, "Realtime subscriber disconnected");
}
