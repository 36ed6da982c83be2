//! Session context shared by everything that issues or observes API calls.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{RememberStore, Session, TokenStore};

const EVENT_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    UserRequested,
    /// The refresh credential was rejected; the user must log in again.
    RefreshDenied(String),
}

/// Lifecycle notifications for the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: i64 },
    Refreshed { user_id: i64 },
    LoggedOut,
    /// Send the user back to the login entry point.
    ForcedLogout { reason: String },
}

/// Token store, remember flag and event channel, owned by the composition root.
#[derive(Clone)]
pub struct SessionContext {
    tokens: TokenStore,
    remember: Arc<dyn RememberStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(remember: Arc<dyn RememberStore>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tokens: TokenStore::new(),
            remember,
            events,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn remember(&self) -> &dyn RememberStore {
        self.remember.as_ref()
    }

    pub fn session(&self) -> Session {
        self.tokens.read()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Clear the session and forget the remember flag.
    pub fn end(&self, reason: LogoutReason) {
        self.tokens.clear();
        if let Err(e) = self.remember.remove() {
            warn!(error = %e, "Failed to remove remember flag");
        }
        match reason {
            LogoutReason::UserRequested => {
                info!("Logged out");
                self.emit(SessionEvent::LoggedOut);
            }
            LogoutReason::RefreshDenied(reason) => {
                warn!(reason = %reason, "Session ended: refresh denied");
                self.emit(SessionEvent::ForcedLogout { reason });
            }
        }
    }
}
