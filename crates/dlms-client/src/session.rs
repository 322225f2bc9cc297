//! Client-side admin session storage.
//!
//! Two tiers: a durable `session.json` in the platform data directory
//! ("remember me") and an in-memory slot that lives as long as the process.
//! Lookups check the durable tier first.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ClientError;

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expiry > now
    }
}

#[derive(Debug)]
pub struct SessionStore {
    durable_path: Option<PathBuf>,
    memory: Mutex<Option<StoredSession>>,
}

impl SessionStore {
    /// Durable tier in the platform data directory, if one can be found.
    pub fn open_default() -> Self {
        let durable_path = directories::ProjectDirs::from("pk", "dlms", "dlms")
            .map(|dirs| dirs.data_dir().join(SESSION_FILE));
        if durable_path.is_none() {
            warn!("Cannot determine data directory, sessions will not be remembered");
        }
        Self {
            durable_path,
            memory: Mutex::new(None),
        }
    }

    /// Durable tier at an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            durable_path: Some(path.into()),
            memory: Mutex::new(None),
        }
    }

    /// No durable tier; `remember` falls back to memory.
    pub fn in_memory() -> Self {
        Self {
            durable_path: None,
            memory: Mutex::new(None),
        }
    }

    pub fn durable_path(&self) -> Option<&Path> {
        self.durable_path.as_deref()
    }

    pub fn store(&self, token: &str, expiry: DateTime<Utc>, remember: bool) -> Result<(), ClientError> {
        let session = StoredSession {
            token: token.to_string(),
            expiry,
        };

        match (&self.durable_path, remember) {
            (Some(path), true) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, serde_json::to_vec_pretty(&session)?)?;
                debug!(path = %path.display(), "Session stored durably");
            }
            _ => {
                *self.memory_slot() = Some(session);
                debug!("Session stored in memory");
            }
        }
        Ok(())
    }

    /// The stored session, live or not. Durable first, then memory.
    pub fn load(&self) -> Option<StoredSession> {
        self.read_durable().or_else(|| self.memory_slot().clone())
    }

    /// Token of a session whose expiry is still ahead of `now`.
    pub fn token_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.load()
            .filter(|s| s.is_live_at(now))
            .map(|s| s.token)
    }

    pub fn token(&self) -> Option<String> {
        self.token_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.token_at(now).is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// Value of the `isAdmin` cookie flag. Present exactly while a session
    /// is stored, so [`clear`](Self::clear) drops it as well.
    pub fn admin_cookie(&self) -> Option<&'static str> {
        self.load().map(|_| "true")
    }

    /// Remove the session from both tiers.
    pub fn clear(&self) {
        *self.memory_slot() = None;
        if let Some(path) = &self.durable_path {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Durable session removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "Failed to remove durable session"),
            }
        }
    }

    fn read_durable(&self) -> Option<StoredSession> {
        let path = self.durable_path.as_ref()?;
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn memory_slot(&self) -> std::sync::MutexGuard<'_, Option<StoredSession>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::with_path(dir.path().join("nested").join(SESSION_FILE))
    }

    #[test]
    fn test_remembered_session_is_durable() {
        let dir = TempDir::new().unwrap();
        let expiry = Utc::now() + Duration::hours(24);

        let store = store_in(&dir);
        store.store("tok", expiry, true).unwrap();
        assert!(store.is_authenticated());

        // A fresh process sees it too.
        let reopened = store_in(&dir);
        assert_eq!(reopened.token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_unremembered_session_is_memory_only() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .store("tok", Utc::now() + Duration::hours(24), false)
            .unwrap();
        assert!(store.is_authenticated());
        assert!(!store.durable_path().unwrap().exists());
        assert!(!store_in(&dir).is_authenticated());
    }

    #[test]
    fn test_clear_removes_both_tiers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let expiry = Utc::now() + Duration::hours(24);
        store.store("durable", expiry, true).unwrap();
        store.store("memory", expiry, false).unwrap();

        store.clear();
        assert!(!store.is_authenticated());
        assert!(store.load().is_none());
        assert!(!store.durable_path().unwrap().exists());
    }

    #[test]
    fn test_expired_session_is_not_authenticated() {
        let store = SessionStore::in_memory();
        let expiry = Utc::now() + Duration::hours(1);
        store.store("tok", expiry, true).unwrap();

        assert!(store.is_authenticated_at(expiry - Duration::seconds(1)));
        assert!(!store.is_authenticated_at(expiry));
        assert!(!store.is_authenticated_at(expiry + Duration::minutes(5)));
    }

    #[test]
    fn test_durable_tier_checked_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let expiry = Utc::now() + Duration::hours(24);
        store.store("memory", expiry, false).unwrap();
        store.store("durable", expiry, true).unwrap();
        assert_eq!(store.token().as_deref(), Some("durable"));
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let path = store.durable_path().unwrap().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();
        assert!(!store.is_authenticated());
    }
}
