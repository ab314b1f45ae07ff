//! Meeting lifecycle API.
//!
//! Meetings move through scheduled -> active -> ended. Starting a meeting
//! assigns its video room name; ending it tears the room down on the SFU
//! on a best-effort basis.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use super::require_profile;
use super::threads::{ensure_member, load_thread};
use crate::auth::Auth;
use crate::db::{Meeting, MeetingStatus, Role, Thread};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::livekit::{RoomClient, thread_room_name};

#[derive(Clone)]
pub struct MeetingsState {
    pub db: crate::db::Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    /// Absent when the server runs without a video backend; ending a
    /// meeting then skips the remote teardown.
    pub rooms: Option<RoomClient>,
}

impl_has_auth_backend!(MeetingsState);

pub fn router(state: MeetingsState) -> Router {
    Router::new()
        .route("/threads/{uuid}/meetings", get(list_meetings))
        .route("/threads/{uuid}/meetings", post(create_meeting))
        .route("/meetings/{uuid}/start", post(start_meeting))
        .route("/meetings/{uuid}/end", post(end_meeting))
        .route("/meetings/{uuid}", delete(delete_meeting))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateMeetingRequest {
    title: String,
    /// When true the meeting is activated immediately with a room name,
    /// skipping the scheduled state.
    #[serde(default)]
    start: bool,
}

#[derive(Serialize)]
struct MeetingResponse {
    uuid: String,
    title: String,
    status: MeetingStatus,
    room_name: Option<String>,
    started_at: Option<String>,
    ended_at: Option<String>,
    created_at: String,
}

impl From<&Meeting> for MeetingResponse {
    fn from(meeting: &Meeting) -> Self {
        Self {
            uuid: meeting.uuid.clone(),
            title: meeting.title.clone(),
            status: meeting.status,
            room_name: meeting.room_name.clone(),
            started_at: meeting.started_at.clone(),
            ended_at: meeting.ended_at.clone(),
            created_at: meeting.created_at.clone(),
        }
    }
}

/// Load a meeting with its thread, enforcing thread membership.
async fn load_meeting_checked(
    state: &MeetingsState,
    uuid: &str,
    profile_id: i64,
    role: Role,
) -> Result<(Meeting, Thread), ApiError> {
    super::error::validate_uuid(uuid)?;
    let meeting = state
        .db
        .meetings()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to load meeting")?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    let thread = state
        .db
        .threads()
        .get_by_id(meeting.thread_id)
        .await
        .db_err("Failed to load thread")?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;
    ensure_member(&state.db, &thread, profile_id, role).await?;
    Ok((meeting, thread))
}

async fn list_meetings(
    State(state): State<MeetingsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let meetings = state
        .db
        .meetings()
        .list_for_thread(thread.id)
        .await
        .db_err("Failed to list meetings")?;

    Ok(Json(
        meetings.iter().map(MeetingResponse::from).collect::<Vec<_>>(),
    ))
}

async fn create_meeting(
    State(state): State<MeetingsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<CreateMeetingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    if title.len() > 200 {
        return Err(ApiError::bad_request("Title is too long"));
    }

    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let meeting_uuid = uuid::Uuid::new_v4().to_string();
    let meeting_id = state
        .db
        .meetings()
        .create(&meeting_uuid, thread.id, title, profile.id)
        .await
        .db_err("Failed to create meeting")?;

    if payload.start {
        let room_name = thread_room_name(&thread.uuid);
        state
            .db
            .meetings()
            .start(meeting_id, &room_name)
            .await
            .db_err("Failed to start meeting")?;
        info!(meeting = %meeting_uuid, room = %room_name, "Meeting started");
    }

    let meeting = state
        .db
        .meetings()
        .get_by_uuid(&meeting_uuid)
        .await
        .db_err("Failed to load meeting")?
        .ok_or_else(|| ApiError::internal("Meeting vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(MeetingResponse::from(&meeting))))
}

/// Activate a scheduled meeting. The room name is derived from the thread
/// UUID plus a millisecond timestamp, so restarts of the same meeting
/// never reuse a room.
async fn start_meeting(
    State(state): State<MeetingsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (meeting, thread) = load_meeting_checked(&state, &uuid, profile.id, profile.role).await?;

    let room_name = thread_room_name(&thread.uuid);
    let started = state
        .db
        .meetings()
        .start(meeting.id, &room_name)
        .await
        .db_err("Failed to start meeting")?;
    if !started {
        return Err(ApiError::conflict("Meeting is not in the scheduled state"));
    }

    info!(meeting = %meeting.uuid, room = %room_name, "Meeting started");

    let meeting = state
        .db
        .meetings()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load meeting")?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    Ok(Json(MeetingResponse::from(&meeting)))
}

/// End an active meeting. Only the creator or an admin may end it.
/// The local state transition is authoritative; a failed teardown on the
/// SFU is logged and swallowed.
async fn end_meeting(
    State(state): State<MeetingsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (meeting, _) = load_meeting_checked(&state, &uuid, profile.id, profile.role).await?;

    if meeting.created_by != profile.id && profile.role != Role::Admin {
        return Err(ApiError::forbidden(
            "Only the meeting creator or an admin can end a meeting",
        ));
    }

    let ended = state
        .db
        .meetings()
        .end(meeting.id)
        .await
        .db_err("Failed to end meeting")?;
    if !ended {
        return Err(ApiError::conflict("Meeting is not active"));
    }

    if let (Some(rooms), Some(room_name)) = (&state.rooms, meeting.room_name.as_deref()) {
        if let Err(e) = rooms.delete_room(room_name).await {
            warn!(room = %room_name, error = %e, "Room teardown failed");
        }
    }

    info!(meeting = %meeting.uuid, "Meeting ended");
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a meeting record. Creator or admin only; active meetings must
/// be ended first.
async fn delete_meeting(
    State(state): State<MeetingsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (meeting, _) = load_meeting_checked(&state, &uuid, profile.id, profile.role).await?;

    if meeting.created_by != profile.id && profile.role != Role::Admin {
        return Err(ApiError::forbidden(
            "Only the meeting creator or an admin can delete a meeting",
        ));
    }
    if meeting.status == MeetingStatus::Active {
        return Err(ApiError::conflict("End the meeting before deleting it"));
    }

    state
        .db
        .meetings()
        .delete(meeting.id)
        .await
        .db_err("Failed to delete meeting")?;

    Ok(StatusCode::NO_CONTENT)
}
