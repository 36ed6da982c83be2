//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;
use crate::jwt;
use crate::session::Session;

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `data` of a login or refresh response.
///
/// Backends disagree on field names and on whether identity is included at
/// all; see [`jwt::resolve_session`] for how gaps are filled.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenData {
    #[serde(rename = "accessToken", alias = "access_token", alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<Value>,
}

impl TokenData {
    pub fn into_session(self) -> Result<Session, AuthError> {
        jwt::resolve_session(self.access_token, self.role.as_deref(), self.user_id.as_ref())
    }
}
