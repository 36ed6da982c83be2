//! Persisted-login bootstrap.
//!
//! Runs once per process start and decides whether the stored remember flag
//! warrants a silent refresh. Protected work waits on a [`SessionGate`] until
//! that decision has settled, so a user who is still validly logged in is not
//! briefly treated as anonymous.

use std::sync::Arc;

use tokio::sync::{OnceCell, watch};
use tracing::{debug, info, warn};

use super::RefreshCoordinator;
use crate::error::AuthError;
use crate::session::{Session, SessionContext};
use crate::transport::Transport;

/// What the bootstrap decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No remember flag: start logged out, no refresh attempted.
    NotRemembered,
    /// A session was already in memory.
    AlreadyAuthenticated,
    /// The silent refresh succeeded.
    Restored(Session),
    /// The silent refresh failed. Not fatal: the session simply stays empty.
    RestoreFailed(AuthError),
}

impl BootstrapOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::AlreadyAuthenticated | Self::Restored(_))
    }
}

/// Read side of the bootstrap gate.
#[derive(Debug, Clone)]
pub struct SessionGate {
    ready: watch::Receiver<bool>,
}

impl SessionGate {
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the bootstrap decision has settled.
    ///
    /// Also returns if the bootstrap is dropped without ever running.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.clone();
        if ready.wait_for(|open| *open).await.is_err() {
            debug!("Bootstrap dropped before the gate opened");
        }
    }
}

pub struct PersistLogin<T> {
    context: SessionContext,
    coordinator: Arc<RefreshCoordinator<T>>,
    outcome: OnceCell<BootstrapOutcome>,
    gate: watch::Sender<bool>,
}

impl<T: Transport> PersistLogin<T> {
    pub fn new(context: SessionContext, coordinator: Arc<RefreshCoordinator<T>>) -> Self {
        let (gate, _rx) = watch::channel(false);
        Self {
            context,
            coordinator,
            outcome: OnceCell::new(),
            gate,
        }
    }

    pub fn gate(&self) -> SessionGate {
        SessionGate {
            ready: self.gate.subscribe(),
        }
    }

    /// Outcome of the bootstrap, if it has completed.
    pub fn outcome(&self) -> Option<&BootstrapOutcome> {
        self.outcome.get()
    }

    /// Run the bootstrap. Later calls return the first outcome without
    /// touching the network again.
    pub async fn run(&self) -> BootstrapOutcome {
        let outcome = self.outcome.get_or_init(|| self.decide()).await.clone();
        self.gate.send_replace(true);
        outcome
    }

    async fn decide(&self) -> BootstrapOutcome {
        if !self.context.remember().is_set() {
            debug!("Remember flag not set, starting logged out");
            return BootstrapOutcome::NotRemembered;
        }
        if self.context.tokens().is_authenticated() {
            debug!("Session already in memory");
            return BootstrapOutcome::AlreadyAuthenticated;
        }

        match self.coordinator.refresh().await {
            Ok(session) => {
                info!(user_id = ?session.user_id(), "Session restored");
                BootstrapOutcome::Restored(session)
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed");
                BootstrapOutcome::RestoreFailed(e)
            }
        }
    }
}
