//! Durable "remember me" flag.
//!
//! Lives outside the in-memory session so it survives restarts. Its presence
//! decides whether startup attempts a silent refresh.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::AuthError;

/// File name used by [`FileRememberStore`] inside the state directory.
pub const REMEMBER_FILE_NAME: &str = "session.json";

pub trait RememberStore: Send + Sync {
    /// Whether the user opted into a persisted login. Absent means no.
    fn is_set(&self) -> bool;

    /// Record the user's choice at login time, overwriting any previous value.
    fn set(&self, remember: bool) -> Result<(), AuthError>;

    /// Forget the choice entirely (logout).
    fn remove(&self) -> Result<(), AuthError>;
}

#[derive(Serialize, Deserialize)]
struct RememberFile {
    persist: bool,
}

/// Stores the flag as `{"persist": true}` in a JSON file.
pub struct FileRememberStore {
    path: PathBuf,
}

impl FileRememberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the flag in [`REMEMBER_FILE_NAME`] under `state_dir`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(REMEMBER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<bool>, AuthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::storage(e)),
        };
        let file: RememberFile = serde_json::from_str(&content).map_err(AuthError::storage)?;
        Ok(Some(file.persist))
    }
}

impl RememberStore for FileRememberStore {
    fn is_set(&self) -> bool {
        match self.load() {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable remember flag");
                false
            }
        }
    }

    fn set(&self, remember: bool) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(AuthError::storage)?;
        }
        let content = serde_json::to_string(&RememberFile { persist: remember })
            .map_err(AuthError::storage)?;
        std::fs::write(&self.path, content).map_err(AuthError::storage)
    }

    fn remove(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::storage(e)),
        }
    }
}

/// Process-local flag, for embedding and tests.
#[derive(Default)]
pub struct MemoryRememberStore {
    flag: Mutex<Option<bool>>,
}

impl MemoryRememberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(remember: bool) -> Self {
        Self {
            flag: Mutex::new(Some(remember)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<bool>> {
        self.flag.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RememberStore for MemoryRememberStore {
    fn is_set(&self) -> bool {
        let flag = *self.lock();
        flag.unwrap_or(false)
    }

    fn set(&self, remember: bool) -> Result<(), AuthError> {
        *self.lock() = Some(remember);
        Ok(())
    }

    fn remove(&self) -> Result<(), AuthError> {
        *self.lock() = None;
        Ok(())
    }
}
