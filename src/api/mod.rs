//! JSON API surface.

mod admin;
mod error;
mod events;
mod livekit;
mod meetings;
mod profile;
mod session;
mod tasks;
mod threads;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::db::{Database, Profile};
use crate::events::EventHub;
use crate::jwt::JwtConfig;
use crate::livekit::{RoomClient, VideoConfig};
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use session::{ProfileResponse, hash_password};

/// Load the caller's profile row fresh from the database. Claims alone
/// are not enough for authorization decisions; the profile may have been
/// deleted since the token was minted.
pub(crate) async fn require_profile(
    db: &Database,
    user: &AuthenticatedUser,
) -> Result<Profile, ApiError> {
    db.profiles()
        .get_by_uuid(&user.claims.sub)
        .await
        .map_err(|e| ApiError::db_error("Failed to load profile", e))?
        .ok_or_else(|| ApiError::unauthorized("Profile not found"))
}

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    events: EventHub,
    video: Option<VideoConfig>,
    allow_adhoc_rooms: bool,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let session_state = session::SessionState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let threads_state = threads::ThreadsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        events: events.clone(),
    };

    let tasks_state = tasks::TasksState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let meetings_state = meetings::MeetingsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        rooms: video.clone().map(RoomClient::new),
    };

    let livekit_state = livekit::LivekitState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        rooms: video.clone().map(RoomClient::new),
        video,
        allow_adhoc_rooms,
    };

    let admin_state = admin::AdminState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let profile_state = profile::ProfileState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let events_state = events::EventsState { db, jwt, events };

    Router::new()
        .nest("/session", session::router(session_state, rate_limit))
        .merge(threads::router(threads_state))
        .merge(tasks::router(tasks_state))
        .merge(meetings::router(meetings_state))
        .merge(events::router(events_state))
        .nest("/livekit", livekit::router(livekit_state))
        .nest("/admin", admin::router(admin_state))
        .nest("/profile", profile::router(profile_state))
}
