pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod jwt;
pub mod session;
pub mod transport;

use auth::{AuthService, PersistLogin, RefreshClient, RefreshCoordinator};
use client::ApiClient;
use config::{ClientConfig, Endpoints};
use error::AuthError;
use session::{FileRememberStore, RememberStore, SessionContext};
use std::sync::Arc;
use transport::{COOKIE_FILE_NAME, ReqwestTransport, Transport};

/// Everything wired together around one transport.
///
/// There is exactly one token store and one refresh coordinator per runtime;
/// every client handed out shares them.
pub struct SessionRuntime<T> {
    transport: Arc<T>,
    context: SessionContext,
    coordinator: Arc<RefreshCoordinator<T>>,
    client: ApiClient<T>,
    auth: AuthService<T>,
    bootstrap: PersistLogin<T>,
}

impl<T: Transport> SessionRuntime<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
        &self.coordinator
    }

    /// Client for authenticated API calls.
    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn auth(&self) -> &AuthService<T> {
        &self.auth
    }

    pub fn bootstrap(&self) -> &PersistLogin<T> {
        &self.bootstrap
    }
}

/// Wire a runtime around `transport`.
pub fn create_runtime<T: Transport>(
    transport: T,
    remember: Arc<dyn RememberStore>,
    endpoints: Endpoints,
) -> SessionRuntime<T> {
    let transport = Arc::new(transport);
    let endpoints = Arc::new(endpoints);
    let context = SessionContext::new(remember);

    let refresh = RefreshClient::new(transport.clone(), context.clone(), endpoints.clone());
    let coordinator = Arc::new(RefreshCoordinator::new(refresh, context.clone()));
    let client = ApiClient::new(
        transport.clone(),
        context.clone(),
        coordinator.clone(),
        endpoints,
    );

    SessionRuntime {
        auth: AuthService::new(client.clone()),
        bootstrap: PersistLogin::new(context.clone(), coordinator.clone()),
        transport,
        context,
        coordinator,
        client,
    }
}

/// Runtime over HTTP, with the remember flag and cookie jar kept in the
/// configured state directory.
pub fn connect(config: &ClientConfig) -> Result<SessionRuntime<ReqwestTransport>, AuthError> {
    let transport = ReqwestTransport::with_cookie_file(
        config.api_url.clone(),
        config.timeout,
        config.state_dir.join(COOKIE_FILE_NAME),
    )?;
    let remember = Arc::new(FileRememberStore::in_dir(&config.state_dir));
    Ok(create_runtime(transport, remember, config.endpoints.clone()))
}
