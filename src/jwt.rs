//! Client-side access token inspection.
//!
//! The client never holds the signing key, so it does not validate tokens; it
//! only reads the payload to recover identity claims the server left out of
//! its response body. Signature checks remain the server's job.

use jsonwebtoken::dangerous::insecure_decode;
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::session::{Credentials, Role, Session};

/// Role claim URI emitted by older backends.
pub const LEGACY_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Claim names checked for the role, in priority order.
pub const ROLE_CLAIMS: [&str; 2] = ["role", LEGACY_ROLE_CLAIM];

/// Claim names checked for the user id, in priority order.
pub const USER_ID_CLAIMS: [&str; 2] = ["userId", "sub"];

/// Decoded (unverified) token payload.
#[derive(Debug, Clone, Default)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    /// Decode the payload of a compact JWT without checking its signature.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        insecure_decode::<Map<String, Value>>(token)
            .map(|data| Self(data.claims))
            .map_err(|e| AuthError::malformed(format!("Invalid access token: {}", e)))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// First role found among [`ROLE_CLAIMS`].
    pub fn role(&self) -> Option<&str> {
        ROLE_CLAIMS
            .iter()
            .find_map(|name| self.get(name).and_then(first_string))
    }

    /// First user id found among [`USER_ID_CLAIMS`].
    pub fn user_id(&self) -> Option<i64> {
        USER_ID_CLAIMS
            .iter()
            .find_map(|name| self.get(name).and_then(as_user_id))
    }

    /// Expiration timestamp (Unix seconds), if present.
    pub fn expires_at(&self) -> Option<u64> {
        self.get("exp").and_then(Value::as_u64)
    }
}

/// Build a session from a token response.
///
/// Identity comes from the response fields when present, otherwise from the
/// token's own claims (see [`TokenClaims::role`] and [`TokenClaims::user_id`]).
/// The token is only decoded when a field is missing.
pub fn resolve_session(
    access_token: String,
    role: Option<&str>,
    user_id: Option<&Value>,
) -> Result<Session, AuthError> {
    if access_token.is_empty() {
        return Err(AuthError::malformed("Response carries no access token"));
    }

    let mut role = role.filter(|r| !r.is_empty()).map(str::to_string);
    let mut user_id = user_id.and_then(as_user_id);

    if role.is_none() || user_id.is_none() {
        let claims = TokenClaims::decode(&access_token)?;
        if role.is_none() {
            role = claims.role().map(str::to_string);
        }
        if user_id.is_none() {
            user_id = claims.user_id();
        }
    }

    let role: Role = role
        .ok_or_else(|| AuthError::malformed("Token carries no role"))?
        .parse()?;
    let user_id = user_id.ok_or_else(|| AuthError::malformed("Token carries no user id"))?;

    Ok(Session::authenticated(Credentials {
        access_token,
        role,
        user_id,
    }))
}

fn first_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

fn as_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
