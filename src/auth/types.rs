//! Authenticated identity types.

use crate::jwt::AccessClaims;

/// Authenticated identity resolved from the session cookies.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims from the access token
    pub claims: AccessClaims,
}
