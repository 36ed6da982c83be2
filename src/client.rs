//! Authenticated API client.
//!
//! Every call made through [`ApiClient`] passes two interceptors:
//!
//! - on the way out, the current access token is attached as a bearer header
//!   unless the caller already set one or the route is login/refresh;
//! - on the way back, a 401/403 from an ordinary endpoint triggers a refresh
//!   through the shared [`RefreshCoordinator`] and the request is replayed
//!   once with the new token.
//!
//! The interceptors are part of the client value itself, so they exist exactly
//! as long as the client does.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::RefreshCoordinator;
use crate::config::Endpoints;
use crate::error::AuthError;
use crate::session::SessionContext;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub struct ApiClient<T> {
    transport: Arc<T>,
    context: SessionContext,
    coordinator: Arc<RefreshCoordinator<T>>,
    endpoints: Arc<Endpoints>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            context: self.context.clone(),
            coordinator: self.coordinator.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(
        transport: Arc<T>,
        context: SessionContext,
        coordinator: Arc<RefreshCoordinator<T>>,
        endpoints: Arc<Endpoints>,
    ) -> Self {
        Self {
            transport,
            context,
            coordinator,
            endpoints,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<T> {
        &self.coordinator
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send a request, refreshing and replaying it once on 401/403.
    ///
    /// HTTP error statuses are returned as responses, not errors. Errors are
    /// transport failures and refresh failures: when the refresh is denied the
    /// session has been ended and [`AuthError::RefreshDenied`] replaces the
    /// original 401.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, AuthError> {
        self.attach_token(&mut request)?;
        let response = self.transport.send(&request).await?;

        if !self.should_refresh(&request, &response) {
            return Ok(response);
        }

        request.mark_retried();
        debug!(
            request_id = %request.id(),
            route = %request.route(),
            status = %response.status,
            "Access token rejected, refreshing"
        );

        let session = self.coordinator.refresh().await?;
        let token = session
            .access_token()
            .ok_or_else(|| AuthError::malformed("Refresh produced no access token"))?;
        request.set_bearer(token)?;

        let replay = self.transport.send(&request).await?;
        info!(
            request_id = %request.id(),
            route = %request.route(),
            status = %replay.status,
            "Replayed request after refresh"
        );
        Ok(replay)
    }

    /// `GET path` and unwrap the envelope's `data`.
    pub async fn get_data<D: DeserializeOwned>(&self, path: &str) -> Result<D, AuthError> {
        self.send(ApiRequest::get(path)).await?.into_data()
    }

    /// Request interceptor. Reads the store, never refreshes.
    fn attach_token(&self, request: &mut ApiRequest) -> Result<(), AuthError> {
        if request.has_authorization() || self.endpoints.is_refresh_exempt(request.route()) {
            return Ok(());
        }
        match self.context.tokens().access_token() {
            Some(token) => request.set_bearer(&token),
            None => Ok(()),
        }
    }

    fn should_refresh(&self, request: &ApiRequest, response: &ApiResponse) -> bool {
        response.is_auth_failure()
            && !request.is_retried()
            && !self.endpoints.is_refresh_exempt(request.route())
    }
}
