//! Session state: who is logged in, with which access token.
//!
//! A [`Session`] is either empty or fully populated. There is no way to build
//! one that carries a token without a role and user id (or the reverse), so
//! no reader can ever observe a half-written session.

mod context;
mod remember;
mod store;

pub use context::{LogoutReason, SessionContext, SessionEvent};
pub use remember::{FileRememberStore, MemoryRememberStore, REMEMBER_FILE_NAME, RememberStore};
pub use store::TokenStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Dashboard user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
            Role::Staff => "STAFF",
        }
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "TEACHER" => Ok(Role::Teacher),
            "STUDENT" => Ok(Role::Student),
            "STAFF" => Ok(Role::Staff),
            other => Err(AuthError::malformed(format!("Unknown role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity carried by an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub role: Role,
    pub user_id: i64,
}

// Keep bearer tokens out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("role", &self.role)
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session(Option<Credentials>);

impl Session {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn authenticated(credentials: Credentials) -> Self {
        Self(Some(credentials))
    }

    /// Build a session from loosely-typed parts.
    ///
    /// Either all three parts are present or none are; anything in between is
    /// rejected with [`AuthError::PartialSession`].
    pub fn from_parts(
        access_token: Option<String>,
        role: Option<Role>,
        user_id: Option<i64>,
    ) -> Result<Self, AuthError> {
        match (access_token, role, user_id) {
            (None, None, None) => Ok(Self::empty()),
            (Some(access_token), Some(role), Some(user_id)) => {
                if access_token.is_empty() {
                    return Err(AuthError::PartialSession("access token is empty"));
                }
                Ok(Self::authenticated(Credentials {
                    access_token,
                    role,
                    user_id,
                }))
            }
            (None, _, _) => Err(AuthError::PartialSession("identity without access token")),
            (Some(_), None, _) => Err(AuthError::PartialSession("access token without role")),
            (Some(_), Some(_), None) => {
                Err(AuthError::PartialSession("access token without user id"))
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.0.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.0.as_ref().map(|c| c.access_token.as_str())
    }

    pub fn role(&self) -> Option<Role> {
        self.0.as_ref().map(|c| c.role)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|c| c.user_id)
    }
}
