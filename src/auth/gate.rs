//! The gate chain: ordered redirect rules applied to every page navigation.
//!
//! Rules, first match wins:
//! 1. anonymous on a non-auth page       -> redirect to login
//! 2. authenticated on an auth page      -> redirect to the app
//! 3. authenticated but unapproved       -> redirect to pending-approval
//!    (auth pages and the pending page itself are exempt)
//! 4. non-admin on an admin path         -> redirect to the app
//!
//! Approval is checked before the admin role, so an unapproved admin is
//! bounced to pending, never granted admin access. The decision is pure
//! and per-request; the profile is re-read on every navigation.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::extractors::authenticate_request;
use super::state::HasAuthBackend;
use crate::db::{Database, Role};
use crate::jwt::JwtConfig;

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const PENDING_PATH: &str = "/pending-approval";
pub const APP_PATH: &str = "/threads";
pub const ADMIN_PREFIX: &str = "/admin";

/// The profile attributes the gate chain consults.
#[derive(Debug, Clone, Copy)]
pub struct GateProfile {
    pub is_approved: bool,
    pub role: Role,
}

/// Terminal state of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    ToLogin,
    ToApp,
    ToPending,
}

/// Evaluate the gate chain for a navigation to `path`.
/// `profile` is None for anonymous requests.
pub fn evaluate(path: &str, profile: Option<GateProfile>) -> GateDecision {
    let is_auth_page = path.starts_with(LOGIN_PATH) || path.starts_with(SIGNUP_PATH);
    let is_pending_page = path.starts_with(PENDING_PATH);

    let Some(profile) = profile else {
        if is_auth_page {
            return GateDecision::Allow;
        }
        return GateDecision::ToLogin;
    };

    if is_auth_page {
        return GateDecision::ToApp;
    }

    if !profile.is_approved && !is_pending_page {
        return GateDecision::ToPending;
    }

    if path.starts_with(ADMIN_PREFIX) && profile.role != Role::Admin {
        return GateDecision::ToApp;
    }

    GateDecision::Allow
}

/// State for the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    /// Escape hatch for credential-less local development (`--no-gate`).
    /// When false the chain is skipped entirely and every page is open.
    pub enabled: bool,
}

impl HasAuthBackend for GateState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }
    fn db(&self) -> &Database {
        &self.db
    }
    fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

/// Axum middleware running the gate chain before a page renders.
pub async fn gate(State(state): State<GateState>, request: Request, next: Next) -> Response {
    if !state.enabled {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    // Resolution failure of any kind degrades to anonymous
    let identity = authenticate_request(&parts, &state).await.ok();

    let profile = match &identity {
        Some(user) => match state.db.profiles().get_by_uuid(&user.claims.sub).await {
            Ok(Some(profile)) => Some(GateProfile {
                is_approved: profile.is_approved,
                role: profile.role,
            }),
            // Profile gone (account removed): treat as anonymous
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "Gate profile lookup failed");
                None
            }
        },
        None => None,
    };

    match evaluate(&path, profile) {
        GateDecision::Allow => next.run(Request::from_parts(parts, body)).await,
        GateDecision::ToLogin => Redirect::temporary(LOGIN_PATH).into_response(),
        GateDecision::ToApp => Redirect::temporary(APP_PATH).into_response(),
        GateDecision::ToPending => Redirect::temporary(PENDING_PATH).into_response(),
    }
}
