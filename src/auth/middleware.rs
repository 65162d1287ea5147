//! Authentication Middleware
//! Bearer JWT for users and admins, shared secrets for the scheduler and
//! payment callbacks.

use crate::auth::jwt::JwtHandler;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Clone)]
pub struct AuthState {
    pub jwt_handler: Arc<JwtHandler>,
    pub cron_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte
fn secrets_match(expected: &str, given: &str) -> bool {
    let (a, b) = (expected.as_bytes(), given.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn header_secret_matches(headers: &HeaderMap, name: &str, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|s| !s.is_empty()) else {
        return false;
    };
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|given| secrets_match(expected, given))
}

/// Require a valid bearer token; inserts `Claims` into request extensions
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;

    let claims = auth
        .jwt_handler
        .validate_token(token)
        .map_err(|_| AuthError::InvalidToken)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Require an admin bearer token
pub async fn admin_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let claims = auth
        .jwt_handler
        .validate_token(token)
        .map_err(|_| AuthError::InvalidToken)?;

    if !claims.is_admin() {
        warn!(user_id = %claims.sub, path = %req.uri().path(), "Non-admin hit admin route");
        return Err(AuthError::Forbidden);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin token, or the scheduler's shared secret
pub async fn admin_or_cron_middleware(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if header_secret_matches(req.headers(), CRON_SECRET_HEADER, auth.cron_secret.as_deref()) {
        return Ok(next.run(req).await);
    }
    admin_middleware(State(auth), req, next).await
}

/// Payment gateway callbacks carry a shared secret header
pub async fn webhook_middleware(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if header_secret_matches(
        req.headers(),
        WEBHOOK_SECRET_HEADER,
        auth.webhook_secret.as_deref(),
    ) {
        Ok(next.run(req).await)
    } else {
        Err(AuthError::InvalidSecret)
    }
}

/// Auth error types
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    Forbidden,
    InvalidSecret,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Admin role required"),
            AuthError::InvalidSecret => (StatusCode::UNAUTHORIZED, "Invalid shared secret"),
        };

        (status, message).into_response()
    }
}
