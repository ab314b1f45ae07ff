//! Account and session endpoints: signup, login, logout, current profile.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use scrypt::{
    Scrypt,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
use crate::db::{Database, Profile};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};

#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(SessionState);

pub fn router(state: SessionState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let mut login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());
    let mut signup_routes = Router::new()
        .route("/signup", post(signup))
        .with_state(state.clone());

    if let Some(config) = rate_limit {
        login_routes = login_routes.layer(middleware::from_fn_with_state(
            config.clone(),
            rate_limit_login,
        ));
        signup_routes =
            signup_routes.layer(middleware::from_fn_with_state(config, rate_limit_signup));
    }

    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
        .merge(login_routes)
        .merge(signup_routes)
}

/// Profile as exposed to clients. Never includes the password hash.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub uuid: String,
    pub username: String,
    pub display_name: String,
    pub role: crate::db::Role,
    pub is_approved: bool,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<&Profile> for ProfileResponse {
    fn from(profile: &Profile) -> Self {
        Self {
            uuid: profile.uuid.clone(),
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            role: profile.role,
            is_approved: profile.is_approved,
            is_verified: profile.is_verified,
            created_at: profile.created_at.clone(),
        }
    }
}

#[derive(Deserialize)]
struct SignupRequest {
    username: String,
    display_name: Option<String>,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

/// Hash a password on a blocking thread; scrypt is deliberately slow.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Scrypt
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                ApiError::internal("Internal server error")
            })
    })
    .await
    .map_err(|_| ApiError::internal("Internal server error"))?
}

/// Verify a password against a stored PHC hash on a blocking thread.
async fn verify_password(hash: String, incoming: String) -> bool {
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&hash)
            .map(|parsed| {
                Scrypt
                    .verify_password(incoming.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

/// Issue both session cookies for a profile and record the refresh token.
async fn issue_session(state: &SessionState, profile: &Profile) -> Result<Response, ApiError> {
    let access = state
        .jwt
        .generate_access_token(&profile.uuid, &profile.username, profile.role)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to generate access token");
            ApiError::internal("Internal server error")
        })?;

    let refresh = state
        .jwt
        .generate_refresh_token(&profile.uuid, &profile.username, profile.role)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to generate refresh token");
            ApiError::internal("Internal server error")
        })?;

    state
        .db
        .tokens()
        .create(
            &refresh.jti,
            profile.id,
            None,
            refresh.issued_at,
            refresh.expires_at,
        )
        .await
        .db_err("Failed to store refresh token")?;

    let mut response = Json(ProfileResponse::from(profile)).into_response();
    let headers = response.headers_mut();
    for cookie in [
        session_cookie(
            ACCESS_COOKIE_NAME,
            &access.token,
            access.duration,
            state.secure_cookies,
        ),
        session_cookie(
            REFRESH_COOKIE_NAME,
            &refresh.token,
            refresh.duration,
            state.secure_cookies,
        ),
    ] {
        if let Ok(value) = cookie.parse() {
            headers.append(SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// Create a new profile. Accounts start unapproved; an admin must approve
/// them before the app pages open up.
async fn signup(
    State(state): State<SessionState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim().to_string();
    validate_username(&username)?;

    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&username)
        .to_string();

    if state
        .db
        .profiles()
        .get_by_username(&username)
        .await
        .db_err("Failed to check username")?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash = hash_password(payload.password).await?;
    let uuid = uuid::Uuid::new_v4().to_string();

    let id = state
        .db
        .profiles()
        .create(&uuid, &username, &display_name, &password_hash)
        .await
        .db_err("Failed to create profile")?;

    let profile = state
        .db
        .profiles()
        .get_by_id(id)
        .await
        .db_err("Failed to load profile")?
        .ok_or_else(|| ApiError::internal("Profile vanished after signup"))?;

    info!(username = %username, "New signup awaiting approval");

    let response = issue_session(&state, &profile).await?;
    Ok((StatusCode::CREATED, response))
}

async fn login(
    State(state): State<SessionState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .db
        .profiles()
        .get_by_username(payload.username.trim())
        .await
        .db_err("Failed to look up profile")?;

    let Some(profile) = profile else {
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    if !verify_password(profile.password_hash.clone(), payload.password).await {
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    issue_session(&state, &profile).await
}

/// Revoke the refresh token and clear both cookies.
/// Succeeds even when the session is already gone.
async fn logout(State(state): State<SessionState>, request: axum::extract::Request) -> Response {
    let (parts, _body) = request.into_parts();

    if let Some(refresh_token) = get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        if let Ok(claims) = state.jwt.validate_refresh_token(refresh_token) {
            if let Err(e) = state.db.tokens().delete_by_jti(&claims.jti).await {
                tracing::error!(error = %e, "Failed to revoke refresh token");
            }
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(value) = clear_cookie(name, state.secure_cookies).parse() {
            headers.append(SET_COOKIE, value);
        }
    }
    response
}

/// Current profile, freshly loaded.
async fn me(
    State(state): State<SessionState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .db
        .profiles()
        .get_by_uuid(&user.claims.sub)
        .await
        .db_err("Failed to load profile")?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(ProfileResponse::from(&profile)))
}
