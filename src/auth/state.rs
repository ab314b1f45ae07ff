//! Authentication state trait and helper macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for router state types that provide what session resolution needs.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn secure_cookies(&self) -> bool;
}

/// Implement `HasAuthBackend` for state structs with the standard fields
/// `jwt: Arc<JwtConfig>`, `db: Database`, and `secure_cookies: bool`.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
