//! Session lifecycle: login, refresh, logout and the startup restore.
//!
//! Access tokens are short-lived and held in memory only. The refresh
//! credential is an httpOnly cookie owned by the transport; it is exchanged
//! for a new access token whenever the server rejects the current one, and
//! once at startup when the user asked to be remembered.

mod bootstrap;
mod coordinator;
mod refresh;
mod service;
mod types;

pub use bootstrap::{BootstrapOutcome, PersistLogin, SessionGate};
pub use coordinator::RefreshCoordinator;
pub use refresh::RefreshClient;
pub use service::AuthService;
pub use types::{LoginRequest, TokenData};
