//! Interactive login and logout.

use tracing::{info, warn};

use super::types::{LoginRequest, TokenData};
use crate::client::ApiClient;
use crate::error::AuthError;
use crate::session::{LogoutReason, Session, SessionEvent};
use crate::transport::{ApiRequest, Transport};

pub struct AuthService<T> {
    client: ApiClient<T>,
}

impl<T: Transport> AuthService<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self { client }
    }

    /// Log in with a username and password.
    ///
    /// `remember` overwrites the stored remember flag, so the next process
    /// start only restores the session when the user asked for it.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, AuthError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(self.client.endpoints().login.as_str()).json(&body)?;
        let response = self.client.send(request).await?;

        if response.is_auth_failure() {
            let message = response.error_message();
            info!(username = %username, reason = %message, "Login rejected");
            return Err(AuthError::LoginRejected(message));
        }

        let envelope = response.envelope::<TokenData>()?;
        if !envelope.is_success() {
            let message = envelope.failure_message();
            info!(username = %username, code = envelope.code, reason = %message, "Login rejected");
            return Err(AuthError::LoginRejected(message));
        }

        let session = envelope.into_data()?.into_session()?;
        let context = self.client.context();
        // A flag that failed to persist leaves the store untouched.
        context.remember().set(remember)?;
        context.tokens().write(session.clone());

        if let Some(user_id) = session.user_id() {
            info!(user_id, role = ?session.role(), remember, "Logged in");
            context.emit(SessionEvent::LoggedIn { user_id });
        }
        Ok(session)
    }

    /// Log out on the server, then end the local session whatever it said.
    ///
    /// If the logout call needed a refresh and that refresh was denied, the
    /// session has already ended as a forced logout and is not ended twice.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.client.endpoints().logout.as_str());
        match self.client.send(request).await {
            Ok(response) if response.status.is_success() => {}
            Ok(response) => {
                warn!(status = %response.status, reason = %response.error_message(), "Logout call failed")
            }
            Err(e) if e.is_forced_logout() => {
                info!(error = %e, "Session already ended during logout");
                return;
            }
            Err(e) => warn!(error = %e, "Logout call failed"),
        }
        self.client.context().end(LogoutReason::UserRequested);
    }
}
