//! Kanban task board API.
//!
//! Tasks live inside threads; every operation requires thread membership
//! (admins bypass). Board columns are `todo`, `in_progress` and `done`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::require_profile;
use super::threads::{ensure_member, load_thread};
use crate::auth::Auth;
use crate::db::{Database, Task, TaskStatus, Thread};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(TasksState);

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/threads/{uuid}/tasks", get(list_tasks))
        .route("/threads/{uuid}/tasks", post(create_task))
        .route("/tasks/{uuid}", put(update_task))
        .route("/tasks/{uuid}", delete(delete_task))
        .route("/tasks/{uuid}/status", put(set_status))
        .route("/tasks/{uuid}/assignee", put(set_assignee))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: TaskStatus,
}

#[derive(Deserialize)]
struct SetAssigneeRequest {
    /// Profile UUID, or null to unassign.
    assignee: Option<String>,
}

#[derive(Serialize)]
struct TaskResponse {
    uuid: String,
    title: String,
    description: String,
    status: TaskStatus,
    assignee: Option<String>,
    created_at: String,
    updated_at: String,
}

async fn task_response(db: &Database, task: &Task) -> Result<TaskResponse, ApiError> {
    let assignee = match task.assignee_id {
        Some(id) => db
            .profiles()
            .get_by_id(id)
            .await
            .db_err("Failed to load assignee")?
            .map(|p| p.username),
        None => None,
    };
    Ok(TaskResponse {
        uuid: task.uuid.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        status: task.status,
        assignee,
        created_at: task.created_at.clone(),
        updated_at: task.updated_at.clone(),
    })
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    if title.len() > 200 {
        return Err(ApiError::bad_request("Title is too long"));
    }
    Ok(())
}

/// Load a task by UUID together with its thread, enforcing membership.
async fn load_task_checked(
    state: &TasksState,
    uuid: &str,
    profile_id: i64,
    role: crate::db::Role,
) -> Result<(Task, Thread), ApiError> {
    super::error::validate_uuid(uuid)?;
    let task = state
        .db
        .tasks()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to load task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    let thread = state
        .db
        .threads()
        .get_by_id(task.thread_id)
        .await
        .db_err("Failed to load thread")?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;
    ensure_member(&state.db, &thread, profile_id, role).await?;
    Ok((task, thread))
}

async fn list_tasks(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let tasks = state
        .db
        .tasks()
        .list_for_thread(thread.id)
        .await
        .db_err("Failed to list tasks")?;

    let mut responses = Vec::with_capacity(tasks.len());
    for task in &tasks {
        responses.push(task_response(&state.db, task).await?);
    }
    Ok(Json(responses))
}

async fn create_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    validate_title(title)?;

    let profile = require_profile(&state.db, &user).await?;
    let thread = load_thread(&state.db, &uuid).await?;
    ensure_member(&state.db, &thread, profile.id, profile.role).await?;

    let task_uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .tasks()
        .create(&task_uuid, thread.id, title, &payload.description, profile.id)
        .await
        .db_err("Failed to create task")?;

    let task = state
        .db
        .tasks()
        .get_by_uuid(&task_uuid)
        .await
        .db_err("Failed to load task")?
        .ok_or_else(|| ApiError::internal("Task vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(task_response(&state.db, &task).await?)))
}

async fn update_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    validate_title(title)?;

    let profile = require_profile(&state.db, &user).await?;
    let (task, _) = load_task_checked(&state, &uuid, profile.id, profile.role).await?;

    state
        .db
        .tasks()
        .update_content(task.id, title, &payload.description)
        .await
        .db_err("Failed to update task")?;

    let task = state
        .db
        .tasks()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(Json(task_response(&state.db, &task).await?))
}

async fn set_status(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (task, _) = load_task_checked(&state, &uuid, profile.id, profile.role).await?;

    state
        .db
        .tasks()
        .set_status(task.id, payload.status)
        .await
        .db_err("Failed to update task status")?;

    Ok(StatusCode::NO_CONTENT)
}

async fn set_assignee(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<SetAssigneeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (task, thread) = load_task_checked(&state, &uuid, profile.id, profile.role).await?;

    let assignee_id = match payload.assignee.as_deref() {
        Some(assignee_uuid) => {
            let assignee = state
                .db
                .profiles()
                .get_by_uuid(assignee_uuid)
                .await
                .db_err("Failed to load assignee")?
                .ok_or_else(|| ApiError::bad_request("Assignee not found"))?;
            // Only thread members can be assigned.
            let member = state
                .db
                .threads()
                .is_member(thread.id, assignee.id)
                .await
                .db_err("Failed to check membership")?;
            if !member {
                return Err(ApiError::bad_request("Assignee is not a thread member"));
            }
            Some(assignee.id)
        }
        None => None,
    };

    state
        .db
        .tasks()
        .set_assignee(task.id, assignee_id)
        .await
        .db_err("Failed to update assignee")?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    let (task, _) = load_task_checked(&state, &uuid, profile.id, profile.role).await?;

    state
        .db
        .tasks()
        .delete(task.id)
        .await
        .db_err("Failed to delete task")?;

    Ok(StatusCode::NO_CONTENT)
}
