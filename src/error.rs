//! Error taxonomy for the session core.
//!
//! Every variant is `Clone` because a single refresh outcome is handed to all
//! requests that were waiting on the same in-flight refresh.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The server rejected the request for lack of a valid access token.
    #[error("Not authenticated")]
    AuthRequired,

    /// The refresh exchange itself was rejected. Terminal for the session.
    #[error("Refresh denied: {0}")]
    RefreshDenied(String),

    /// Network-level failure. The session is left untouched.
    #[error("Network failure: {0}")]
    TransientNetworkFailure(String),

    /// The server answered but the envelope signalled failure or could not be decoded.
    #[error("{message}")]
    MalformedServerResponse { code: Option<i64>, message: String },

    /// The login endpoint refused the supplied credentials.
    #[error("Login rejected: {0}")]
    LoginRejected(String),

    /// A session write was attempted with some but not all identity fields.
    #[error("Partial session rejected: {0}")]
    PartialSession(&'static str),

    /// Durable client-side state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request could not be built (bad header value, unserializable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AuthError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedServerResponse {
            code: None,
            message: message.into(),
        }
    }

    pub fn network(e: impl std::fmt::Display) -> Self {
        Self::TransientNetworkFailure(e.to_string())
    }

    pub fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string())
    }

    /// Whether the caller should treat this error as "you have been logged out".
    pub fn is_forced_logout(&self) -> bool {
        matches!(self, Self::RefreshDenied(_))
    }
}
