//! In-memory token store with change notification.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::Session;

/// Single source of truth for the current [`Session`].
///
/// Cloning is cheap and every clone refers to the same session. Writes swap
/// the whole value at once, and subscribers are notified on every change.
#[derive(Clone)]
pub struct TokenStore {
    tx: Arc<watch::Sender<Session>>,
}

impl TokenStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::empty());
        Self { tx: Arc::new(tx) }
    }

    /// Current session. Empty when nobody is logged in.
    pub fn read(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Replace the session wholesale.
    pub fn write(&self, session: Session) {
        match session.credentials() {
            Some(c) => debug!(user_id = c.user_id, role = %c.role, "Session written"),
            None => debug!("Session emptied"),
        }
        self.tx.send_replace(session);
    }

    pub fn clear(&self) {
        self.write(Session::empty());
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().access_token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    /// Observe session changes. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
