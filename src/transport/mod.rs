//! HTTP request/response types and the transport seam.
//!
//! [`Transport`] is the plain HTTP client (base URL, cookie jar, timeouts).
//! Auth behaviour is layered on top of it by [`crate::client::ApiClient`]; a
//! transport never attaches bearer tokens or retries on its own.

mod remote;

pub use remote::{COOKIE_FILE_NAME, ReqwestTransport};

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::envelope;
use crate::error::AuthError;

/// An outgoing API call, addressed relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus optional query, e.g. `/students?page=2`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    id: Uuid,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            id: Uuid::new_v4(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AuthError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| AuthError::InvalidRequest(format!("Unserializable body: {}", e)))?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn header(mut self, name: header::HeaderName, value: &str) -> Result<Self, AuthError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| AuthError::InvalidRequest(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Correlation id for logs. Kept across the replay of a retried request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(header::AUTHORIZATION)
    }

    /// Set `Authorization: Bearer <token>`, replacing any existing credential.
    pub fn set_bearer(&mut self, token: &str) -> Result<(), AuthError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| AuthError::InvalidRequest(format!("Invalid access token: {}", e)))?;
        value.set_sensitive(true);
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    /// Whether this request has already been replayed after a refresh.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 401 or 403: the responses that can be cured by a refresh.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AuthError::malformed(format!("Invalid response body: {}", e)))
    }

    /// Parse the body as an envelope without judging its code.
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<envelope::Envelope<T>, AuthError> {
        envelope::parse(&self.body)
    }

    /// Server-provided failure message, falling back to the status line.
    pub fn error_message(&self) -> String {
        match self.envelope::<serde_json::Value>() {
            Ok(env) if !env.message.is_empty() => env.message,
            _ => self.status.to_string(),
        }
    }

    /// Unwrap a successful envelope's `data`.
    ///
    /// 401/403 become [`AuthError::AuthRequired`]; any other failure carries
    /// the server's message.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, AuthError> {
        if self.is_auth_failure() {
            return Err(AuthError::AuthRequired);
        }
        match self.envelope::<T>() {
            Ok(env) => env.into_data(),
            Err(_) if !self.status.is_success() => Err(AuthError::MalformedServerResponse {
                code: None,
                message: self.status.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Sends requests to the API and returns raw responses.
///
/// Implementations resolve [`ApiRequest::path`] against their base URL and
/// manage cookies themselves. Network-level failures are reported as
/// [`AuthError::TransientNetworkFailure`]; HTTP error statuses are not errors
/// at this layer.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, AuthError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, AuthError>> + Send {
        self.as_ref().send(request)
    }
}
