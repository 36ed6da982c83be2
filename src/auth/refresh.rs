//! Refresh-cookie → access-token exchange.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::TokenData;
use crate::config::Endpoints;
use crate::error::AuthError;
use crate::session::{Session, SessionContext, SessionEvent};
use crate::transport::{ApiRequest, Transport};

/// Performs a single refresh exchange.
///
/// The request goes straight to the transport: no bearer header is attached
/// and a 401 here never loops back into another refresh. Callers that may run
/// concurrently should go through [`super::RefreshCoordinator`] instead.
pub struct RefreshClient<T> {
    transport: Arc<T>,
    context: SessionContext,
    endpoints: Arc<Endpoints>,
}

impl<T: Transport> RefreshClient<T> {
    pub fn new(transport: Arc<T>, context: SessionContext, endpoints: Arc<Endpoints>) -> Self {
        Self {
            transport,
            context,
            endpoints,
        }
    }

    /// Exchange the refresh credential for a new session.
    ///
    /// On success the session is written to the token store before this
    /// returns. The store is not touched on failure.
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let request = ApiRequest::post(self.endpoints.refresh.as_str());
        debug!(request_id = %request.id(), "Requesting access token refresh");

        let response = self.transport.send(&request).await.inspect_err(|e| {
            warn!(error = %e, "Refresh request failed");
        })?;

        if response.is_auth_failure() {
            let message = response.error_message();
            info!(status = %response.status, reason = %message, "Refresh rejected");
            return Err(AuthError::RefreshDenied(message));
        }

        if !response.status.is_success() {
            warn!(status = %response.status, "Refresh endpoint error");
            return Err(AuthError::TransientNetworkFailure(format!(
                "Refresh endpoint returned {}",
                response.status
            )));
        }

        let envelope = response.envelope::<TokenData>()?;
        if !envelope.is_success() {
            let message = envelope.failure_message();
            info!(code = envelope.code, reason = %message, "Refresh rejected");
            return Err(AuthError::RefreshDenied(message));
        }

        let session = envelope.into_data()?.into_session()?;
        self.context.tokens().write(session.clone());

        if let Some(user_id) = session.user_id() {
            info!(user_id, role = ?session.role(), "Access token refreshed");
            self.context.emit(SessionEvent::Refreshed { user_id });
        }

        Ok(session)
    }
}
