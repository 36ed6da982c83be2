//! The `{ code, message, data }` wrapper every dashboard API response uses.
//!
//! HTTP 200 does not mean success: only `code == 1000` does.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Envelope code signalling success.
pub const SUCCESS_CODE: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Check the code and return whatever `data` the server sent (possibly none).
    pub fn check(self) -> Result<Option<T>, AuthError> {
        if !self.is_success() {
            return Err(AuthError::MalformedServerResponse {
                code: Some(self.code),
                message: self.failure_message(),
            });
        }
        Ok(self.data)
    }

    /// Check the code and require a `data` payload.
    pub fn into_data(self) -> Result<T, AuthError> {
        let code = self.code;
        self.check()?.ok_or(AuthError::MalformedServerResponse {
            code: Some(code),
            message: "Response envelope has no data".into(),
        })
    }

    /// The server's message, or a generic one when it sent none.
    pub fn failure_message(&self) -> String {
        if self.message.is_empty() {
            format!("Request failed with code {}", self.code)
        } else {
            self.message.clone()
        }
    }
}

/// Parse an envelope from a raw body.
pub fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, AuthError> {
    serde_json::from_slice(body)
        .map_err(|e| AuthError::malformed(format!("Invalid response envelope: {}", e)))
}
