//! Admin API: approval queue and profile management.
//!
//! Every handler requires an admin access token. Role and approval
//! changes take effect on the target's next navigation, since the gate
//! reads the profile row fresh on each request.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::session::ProfileResponse;
use crate::auth::AdminAuth;
use crate::db::{Database, Profile, Role};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/{uuid}/approve", post(approve_profile))
        .route("/profiles/{uuid}/role", put(set_role))
        .route("/profiles/{uuid}/verified", put(set_verified))
        .route("/profiles/{uuid}", delete(delete_profile))
        .with_state(state)
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: Role,
}

#[derive(Deserialize)]
struct SetVerifiedRequest {
    verified: bool,
}

async fn load_profile(db: &Database, uuid: &str) -> Result<Profile, ApiError> {
    super::error::validate_uuid(uuid)?;
    db.profiles()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to load profile")?
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}

/// List all profiles, pending approvals first.
async fn list_profiles(
    State(state): State<AdminState>,
    AdminAuth(_): AdminAuth,
) -> Result<impl IntoResponse, ApiError> {
    let profiles = state
        .db
        .profiles()
        .list()
        .await
        .db_err("Failed to list profiles")?;
    Ok(Json(
        profiles.iter().map(ProfileResponse::from).collect::<Vec<_>>(),
    ))
}

async fn approve_profile(
    State(state): State<AdminState>,
    AdminAuth(admin): AdminAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = load_profile(&state.db, &uuid).await?;

    state
        .db
        .profiles()
        .approve(profile.id)
        .await
        .db_err("Failed to approve profile")?;

    info!(profile = %profile.username, by = %admin.claims.username, "Profile approved");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_role(
    State(state): State<AdminState>,
    AdminAuth(admin): AdminAuth,
    Path(uuid): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if uuid == admin.claims.sub {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }
    let profile = load_profile(&state.db, &uuid).await?;

    state
        .db
        .profiles()
        .set_role(profile.id, payload.role)
        .await
        .db_err("Failed to update role")?;

    info!(
        profile = %profile.username,
        role = payload.role.as_str(),
        by = %admin.claims.username,
        "Role changed"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn set_verified(
    State(state): State<AdminState>,
    AdminAuth(_): AdminAuth,
    Path(uuid): Path<String>,
    Json(payload): Json<SetVerifiedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = load_profile(&state.db, &uuid).await?;

    state
        .db
        .profiles()
        .set_verified(profile.id, payload.verified)
        .await
        .db_err("Failed to update verified flag")?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a profile and revoke all of its refresh tokens.
async fn delete_profile(
    State(state): State<AdminState>,
    AdminAuth(admin): AdminAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if uuid == admin.claims.sub {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    let profile = load_profile(&state.db, &uuid).await?;

    state
        .db
        .tokens()
        .delete_all_by_user(profile.id)
        .await
        .db_err("Failed to revoke tokens")?;
    state
        .db
        .profiles()
        .delete(profile.id)
        .await
        .db_err("Failed to delete profile")?;

    info!(profile = %profile.username, by = %admin.claims.username, "Profile deleted");
    Ok(StatusCode::NO_CONTENT)
}
