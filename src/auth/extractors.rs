//! Session resolver and axum extractors.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie, session_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::Role;

tokio::task_local! {
    /// Task-local slot for a freshly minted access token cookie.
    /// Set by the resolver when it refreshes, picked up by
    /// `add_access_token_cookie` when the response goes out.
    pub static NEW_ACCESS_TOKEN_COOKIE: RefCell<Option<String>>;
}

/// Resolve the session cookies on a request to an authenticated identity.
///
/// Tries the access token first; if that is missing or expired, falls back
/// to the refresh token, verifies it against the revocation table, reloads
/// the profile, and mints a new access token. The new cookie is stashed in
/// the task-local so the same request sees the refreshed session and the
/// response middleware can propagate it to the client.
pub async fn authenticate_request<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    // Valid access token is the fast path
    if let Some(access_token) = get_cookie(&parts.headers, ACCESS_COOKIE_NAME) {
        if let Ok(claims) = state.jwt().validate_access_token(access_token) {
            return Ok(AuthenticatedUser { claims });
        }
    }

    // Access token missing or expired, try the refresh token
    let refresh_token =
        get_cookie(&parts.headers, REFRESH_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let refresh_claims = state
        .jwt()
        .validate_refresh_token(refresh_token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    // Revoked tokens are removed from the table
    state
        .db()
        .tokens()
        .get_by_jti(&refresh_claims.jti)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to check refresh token");
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::TokenRevoked)?;

    let profile = state
        .db()
        .profiles()
        .get_by_uuid(&refresh_claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load profile");
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::ProfileNotFound)?;

    let access_result = state
        .jwt()
        .generate_access_token(&profile.uuid, &profile.username, profile.role)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to generate access token");
            AuthErrorKind::DatabaseError
        })?;

    let new_cookie = session_cookie(
        ACCESS_COOKIE_NAME,
        &access_result.token,
        access_result.duration,
        state.secure_cookies(),
    );
    let _ = NEW_ACCESS_TOKEN_COOKIE.try_with(|cell| {
        cell.borrow_mut().replace(new_cookie);
    });

    let claims = state
        .jwt()
        .validate_access_token(&access_result.token)
        .map_err(|_| AuthErrorKind::DatabaseError)?;

    Ok(AuthenticatedUser { claims })
}

/// Response middleware that attaches a refreshed access token cookie.
/// Must wrap every router whose handlers resolve sessions.
pub async fn add_access_token_cookie(request: Request, next: Next) -> Response {
    NEW_ACCESS_TOKEN_COOKIE
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;

            let new_cookie = NEW_ACCESS_TOKEN_COOKIE.with(|cell| cell.borrow_mut().take());
            if let Some(cookie) = new_cookie {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }

            response
        })
        .await
}

/// Extractor for API endpoints that require authentication.
/// Rejects with a JSON 401 instead of a redirect.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(ApiAuthError::from)
    }
}

/// Extractor for API endpoints restricted to administrators.
/// The role is taken from the access token, so it lags a role change by
/// at most the access token lifetime.
pub struct AdminAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if user.claims.role != Role::Admin {
            return Err(ApiAuthError(AuthErrorKind::InsufficientRole));
        }

        Ok(AdminAuth(user))
    }
}

/// Optional authentication extractor. Never fails.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate_request(parts, state).await.ok()))
    }
}
