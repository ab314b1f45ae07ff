//! Video room authorization.
//!
//! Two endpoints guard access to the SFU: `GET /token` mints a join grant
//! after checking the caller against the room's thread, and
//! `POST /end-room` tears a room down for its meeting creator or an
//! admin. Room names of the form `thread-<uuid>-<millis>` are scoped to
//! that thread; any other name is an ad-hoc room governed by server
//! policy.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use super::require_profile;
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::db::{Database, Profile, Role};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::livekit::{RoomClient, RoomScope, VideoConfig, mint_join_token};

#[derive(Clone)]
pub struct LivekitState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    /// Absent when the server runs without a video backend; both
    /// endpoints then answer 500.
    pub video: Option<VideoConfig>,
    pub rooms: Option<RoomClient>,
    /// Whether rooms outside the `thread-` namespace may be joined.
    pub allow_adhoc_rooms: bool,
}

impl_has_auth_backend!(LivekitState);

pub fn router(state: LivekitState) -> Router {
    Router::new()
        .route("/token", get(issue_token))
        .route("/end-room", post(end_room))
        .with_state(state)
}

#[derive(Deserialize)]
struct TokenParams {
    room: Option<String>,
    username: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct EndRoomRequest {
    room: Option<String>,
}

/// Resolve the caller to a fresh profile, or fail with the right status.
/// Parameter errors are reported before authentication errors.
async fn resolve_caller(
    db: &Database,
    user: Option<AuthenticatedUser>,
) -> Result<Profile, ApiError> {
    let user = user.ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    require_profile(db, &user).await
}

/// `GET /token?room=<name>&username=<display>`
///
/// For a thread-scoped room the caller must be a member of that thread
/// (admins bypass). The grant identity is always the caller's account
/// username; the `username` parameter only sets the display name shown
/// to other participants.
async fn issue_token(
    State(state): State<LivekitState>,
    OptionalAuth(user): OptionalAuth,
    Query(params): Query<TokenParams>,
) -> Result<impl IntoResponse, ApiError> {
    let room = params
        .room
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'room' query parameter"))?;
    let display_name = params
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'username' query parameter"))?;

    let profile = resolve_caller(&state.db, user).await?;

    let Some(video) = &state.video else {
        return Err(ApiError::internal("Video backend is not configured"));
    };

    match RoomScope::parse(room) {
        RoomScope::Thread(thread_uuid) => {
            if profile.role != Role::Admin {
                let member = match state
                    .db
                    .threads()
                    .get_by_uuid(&thread_uuid.to_string())
                    .await
                    .db_err("Failed to load thread")?
                {
                    Some(thread) => state
                        .db
                        .threads()
                        .is_member(thread.id, profile.id)
                        .await
                        .db_err("Failed to check membership")?,
                    None => false,
                };
                if !member {
                    return Err(ApiError::forbidden(
                        "You are not a member of this room's thread",
                    ));
                }
            }
        }
        RoomScope::Adhoc => {
            if !state.allow_adhoc_rooms && profile.role != Role::Admin {
                return Err(ApiError::forbidden("Ad-hoc rooms are disabled"));
            }
        }
    }

    let token = mint_join_token(video, room, &profile.username, display_name)
        .map_err(|e| ApiError::internal(format!("Failed to sign grant: {}", e)))?;

    info!(room = %room, identity = %profile.username, "Join grant issued");
    Ok(Json(TokenResponse { token }))
}

/// `POST /end-room` with `{"room": "<name>"}`
///
/// The room must map to a known meeting; only that meeting's creator or
/// an admin may tear it down. Meeting status is owned by the meetings
/// API, not here. A failed remote deletion does not fail the request.
async fn end_room(
    State(state): State<LivekitState>,
    OptionalAuth(user): OptionalAuth,
    Json(payload): Json<EndRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = payload
        .room
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'room' field"))?;

    let profile = resolve_caller(&state.db, user).await?;

    let Some(rooms) = &state.rooms else {
        return Err(ApiError::internal("Video backend is not configured"));
    };

    let meeting = state
        .db
        .meetings()
        .get_by_room_name(room)
        .await
        .db_err("Failed to load meeting")?
        .ok_or_else(|| ApiError::not_found("No meeting for this room"))?;

    if meeting.created_by != profile.id && profile.role != Role::Admin {
        return Err(ApiError::forbidden(
            "Only the meeting creator or an admin can end this room",
        ));
    }

    if let Err(e) = rooms.delete_room(room).await {
        warn!(room = %room, error = %e, "Room teardown failed");
    }

    info!(room = %room, by = %profile.username, "Room ended");
    Ok(Json(json!({ "success": true })))
}
