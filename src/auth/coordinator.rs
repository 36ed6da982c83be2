//! Single-flight refresh coordination.
//!
//! At most one refresh exchange runs at a time. The first caller to need a
//! refresh becomes the leader and performs it; anyone who asks while it is in
//! flight is queued and receives the leader's outcome. This matters because
//! the server rotates the refresh cookie on every exchange: two parallel
//! exchanges would race each other and the loser would be rejected.
//!
//! ```text
//!           refresh()              settle (ok / denied / network)
//!   Idle ───────────────▶ Refreshing ───────────────────────────▶ Idle
//!                           │   ▲
//!                           └───┘ refresh(): enqueue waiter
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info};

use super::refresh::RefreshClient;
use crate::error::AuthError;
use crate::session::{LogoutReason, Session, SessionContext};
use crate::transport::Transport;

type Outcome = Result<Session, AuthError>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<Outcome>>,
    },
}

pub struct RefreshCoordinator<T> {
    client: RefreshClient<T>,
    context: SessionContext,
    state: Mutex<RefreshState>,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(client: RefreshClient<T>, context: SessionContext) -> Self {
        Self {
            client,
            context,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Whether a refresh exchange is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Number of callers queued behind the in-flight refresh.
    pub fn waiting(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Refresh the session, joining the in-flight exchange if there is one.
    ///
    /// On [`AuthError::RefreshDenied`] the session has already been ended
    /// (store cleared, remember flag removed, forced-logout event sent) by the
    /// time any caller sees the error.
    pub async fn refresh(&self) -> Outcome {
        // The transition happens under the lock, before any network call, so
        // two callers can never both observe Idle.
        let waiter = {
            let mut state = self.lock_state();
            match &mut *state {
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: VecDeque::new(),
                    };
                    None
                }
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    debug!(queued = waiters.len(), "Joining in-flight refresh");
                    Some(rx)
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(AuthError::TransientNetworkFailure(
                    "Refresh was abandoned before it settled".into(),
                ))
            });
        }

        let flight = Flight {
            coordinator: self,
            settled: false,
        };
        let outcome = self.client.refresh().await;

        if let Err(AuthError::RefreshDenied(reason)) = &outcome {
            self.context.end(LogoutReason::RefreshDenied(reason.clone()));
        }

        flight.settle(&outcome);
        outcome
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return to Idle and hand back whoever was queued, in arrival order.
    fn take_waiters(&self) -> VecDeque<oneshot::Sender<Outcome>> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        }
    }
}

/// Leader's hold on the Refreshing state.
///
/// Settling releases the waiters with the outcome. Dropping without settling
/// (the leader's future was cancelled) still returns the state to Idle; the
/// waiters' channels close and they fail instead of hanging.
struct Flight<'a, T: Transport> {
    coordinator: &'a RefreshCoordinator<T>,
    settled: bool,
}

impl<T: Transport> Flight<'_, T> {
    fn settle(mut self, outcome: &Outcome) {
        let waiters = self.coordinator.take_waiters();
        self.settled = true;

        match outcome {
            Ok(_) => info!(waiters = waiters.len(), "Refresh settled"),
            Err(e) => info!(waiters = waiters.len(), error = %e, "Refresh failed"),
        }
        for waiter in waiters {
            // A waiter whose request was dropped is not an error.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl<T: Transport> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            let waiters = self.coordinator.take_waiters();
            debug!(waiters = waiters.len(), "Refresh abandoned");
        }
    }
}
