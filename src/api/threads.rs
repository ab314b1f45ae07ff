//! Threads and messages API.
//!
//! Every endpoint requires authentication. Posting and reading messages
//! additionally require thread membership; admins bypass the membership
//! requirement for moderation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::require_profile;
use crate::auth::Auth;
use crate::db::{Database, Message, Role, Thread};
use crate::events::{EventHub, ThreadEvent};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ThreadsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub events: EventHub,
}

impl_has_auth_backend!(ThreadsState);

pub fn router(state: ThreadsState) -> Router {
    Router::new()
        .route("/threads", get(list_threads))
        .route("/threads", post(create_thread))
        .route("/threads/{uuid}", get(get_thread))
        .route("/threads/{uuid}/join", post(join_thread))
        .route("/threads/{uuid}/messages", get(list_messages))
        .route("/threads/{uuid}/messages", post(create_message))
        .route(
            "/threads/{uuid}/messages/{message_uuid}",
            delete(delete_message),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateThreadRequest {
    title: String,
}

#[derive(Serialize)]
struct ThreadResponse {
    uuid: String,
    title: String,
    created_at: String,
    member_count: i64,
    is_member: bool,
}

#[derive(Deserialize)]
struct CreateMessageRequest {
    content: String,
}

#[derive(Serialize)]
struct MessageResponse {
    uuid: String,
    author: String,
    content: String,
    created_at: String,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            uuid: message.uuid.clone(),
            author: message.author_username.clone(),
            content: message.content.clone(),
            created_at: message.created_at.clone(),
        }
    }
}

// --- Helpers ---

/// Load a thread by UUID or 404.
pub(super) async fn load_thread(db: &Database, uuid: &str) -> Result<Thread, ApiError> {
    super::error::validate_uuid(uuid)?;
    db.threads()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to load thread")?
        .ok_or_else(|| ApiError::not_found("Thread not found"))
}

/// Require the caller to be a member of the thread. Admins pass.
pub(super) async fn ensure_member(
    db: &Database,
    thread: &Thread,
    profile_id: i64,
    role: Role,
) -> Result<(), ApiError> {
    if role == Role::Admin {
        return Ok(());
    }
    let member = db
        .threads()
        .is_member(thread.id, profile_id)
        .await
        .db_err("Failed to check membership")?;
    if !member {
        return Err(ApiError::forbidden("Not a member of this thread"));
    }
    Ok(())
}

// --- Handlers ---

async fn list_threads(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let threads = state
        .db
        .threads()
        .list()
        .await
        .db_err("Failed to list threads")?;

    let mut responses = Vec::with_capacity(threads.len());
    for thread in &threads {
        responses.push(ThreadResponse {
            uuid: thread.uuid.clone(),
            title: thread.title.clone(),
            created_at: thread.created_at.clone(),
            member_count: state
                .db
                .threads()
                .member_count(thread.id)
                .await
                .db_err("Failed to count members")?,
            is_member: state
                .db
                .threads()
                .is_member(thread.id, profile.id)
                .await
                .db_err("Failed to check membership")?,
        });
    }

    Ok(Json(responses))
}

/// Create a thread. The creator becomes its first member.
async fn create_thread(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Json(payload): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    if title.len() > 200 {
        return Err(ApiError::bad_request("Title is too long"));
    }

    let profile = require_profile(&state.db, &user).await?;
    let uuid = uuid::Uuid::new_v4().to_string();

    state
        .db
        .threads()
        .create(&uuid, title, profile.id)
        .await
        .db_err("Failed to create thread")?;
    let thread = load_thread(&state.db, &uuid).await?;

    info!(thread = %uuid, by = %profile.username, "Thread created");

    Ok((
        StatusCode::CREATED,
        Json(ThreadResponse {
            uuid: thread.uuid,
            title: thread.title,
            created_at: thread.created_at,
            member_count: 1,
            is_member: true,
        }),
    ))
}

async fn get_thread(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;

    Ok(Json(ThreadResponse {
        uuid: thread.uuid.clone(),
        title: thread.title.clone(),
        created_at: thread.created_at.clone(),
        member_count: state
            .db
            .threads()
            .member_count(thread.id)
            .await
            .db_err("Failed to count members")?,
        is_member: state
            .db
            .threads()
            .is_member(thread.id, profile.id)
            .await
            .db_err("Failed to check membership")?,
    }))
}

async fn join_thread(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;

    state
        .db
        .threads()
        .add_member(thread.id, profile.id)
        .await
        .db_err("Failed to join thread")?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let messages = state
        .db
        .messages()
        .list_for_thread(thread.id)
        .await
        .db_err("Failed to list messages")?;

    Ok(Json(
        messages.iter().map(MessageResponse::from).collect::<Vec<_>>(),
    ))
}

/// Post a message and fan it out to realtime subscribers.
async fn create_message(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }
    if content.len() > 10_000 {
        return Err(ApiError::bad_request("Message is too long"));
    }

    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let message_uuid = uuid::Uuid::new_v4().to_string();
    let message = state
        .db
        .messages()
        .create(&message_uuid, thread.id, profile.id, content)
        .await
        .db_err("Failed to create message")?;

    state.events.publish(
        thread.id,
        ThreadEvent::MessageCreated {
            uuid: message.uuid.clone(),
            author: message.author_username.clone(),
            content: message.content.clone(),
            created_at: message.created_at.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(MessageResponse::from(&message))))
}

/// Delete a message. Allowed for the author and for admins (moderation).
async fn delete_message(
    State(state): State<ThreadsState>,
    Auth(user): Auth,
    Path((uuid, message_uuid)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;

    let message = state
        .db
        .messages()
        .get_by_uuid(&message_uuid)
        .await
        .db_err("Failed to load message")?
        .filter(|m| m.thread_id == thread.id)
        .ok_or_else(|| ApiError::not_found("Message not found"))?;

    let is_author = message.author_id == profile.id;
    if !is_author && profile.role != Role::Admin {
        return Err(ApiError::forbidden("You can only delete your own messages"));
    }

    state
        .db
        .messages()
        .delete(message.id)
        .await
        .db_err("Failed to delete message")?;

    state.events.publish(
        thread.id,
        ThreadEvent::MessageDeleted {
            uuid: message.uuid.clone(),
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
