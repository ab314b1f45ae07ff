//! Self-service profile API. Only the display name is editable; username,
//! role and approval are controlled elsewhere.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::require_profile;
use super::session::ProfileResponse;
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProfileState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(ProfileState);

pub fn router(state: ProfileState) -> Router {
    Router::new()
        .route("/", get(get_profile))
        .route("/", put(update_profile))
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    display_name: String,
}

async fn get_profile(
    State(state): State<ProfileState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = require_profile(&state.db, &user).await?;
    Ok(Json(ProfileResponse::from(&profile)))
}

async fn update_profile(
    State(state): State<ProfileState>,
    Auth(user): Auth,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::bad_request("Display name cannot be empty"));
    }
    if display_name.len() > 64 {
        return Err(ApiError::bad_request("Display name is too long"));
    }

    let profile = require_profile(&state.db, &user).await?;
    state
        .db
        .profiles()
        .set_display_name(profile.id, display_name)
        .await
        .db_err("Failed to update display name")?;

    let profile = require_profile(&state.db, &user).await?;
    Ok(Json(ProfileResponse::from(&profile)))
}
