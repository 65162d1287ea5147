//! Authentication Models
//! Identity lives with the external provider; we only see its token claims.

use serde::{Deserialize, Serialize};

/// Roles carried in provider tokens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin, // Settlement, results and promo management
    #[serde(rename = "user", alias = "authenticated")]
    #[default]
    User,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    pub exp: usize, // expiration timestamp
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
