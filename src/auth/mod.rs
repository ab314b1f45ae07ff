//! Session resolution and request gating.
//!
//! Dual-token cookie sessions: short-lived access tokens (5 min,
//! stateless) and long-lived refresh tokens (2 weeks, database-tracked).
//! Expired access tokens are refreshed transparently by the resolver and
//! the new cookie is attached to the response by middleware. The gate
//! chain layers approval and role redirects on top for page navigations.

mod cookie;
mod errors;
mod extractors;
pub mod gate;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminAuth, Auth, NEW_ACCESS_TOKEN_COOKIE, OptionalAuth, add_access_token_cookie,
    authenticate_request,
};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
