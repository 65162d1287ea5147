//! Authentication Module
//! Provider-issued JWTs for users/admins, shared secrets for machine callers

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtHandler;
pub use middleware::{
    admin_middleware, admin_or_cron_middleware, auth_middleware, webhook_middleware, AuthState,
};
pub use models::{Claims, UserRole};
