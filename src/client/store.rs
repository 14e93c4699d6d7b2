//! Persisted client-side state.
//!
//! One JSON document holds the session, settings and the local report cache.
//! It survives restarts but is never the source of truth; the server is.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::session::Session;
use super::settings::{NotificationSettings, Theme};
use crate::models::Report;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access local state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("local state at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A report kept on this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedReport {
    pub report: Report,
    /// Not yet accepted by the server.
    pub pending_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// The persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub report_cache: Vec<CachedReport>,
}

/// Shared handle to the client state. Clones refer to the same document.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Arc<Mutex<ClientState>>,
}

impl LocalStore {
    /// Open the state file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => ClientState::default(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ClientState::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path: Some(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(Mutex::new(ClientState::default())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read from the current state.
    pub fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the state and persist it. Nothing changes if the write fails.
    pub fn update<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> Result<R, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let result = f(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(result)
    }

    // ============= SESSION =============

    pub fn session(&self) -> Option<Session> {
        self.read(|s| s.session.clone())
    }

    pub fn set_session(&self, session: Session) -> Result<(), StoreError> {
        self.update(|s| s.session = Some(session))
    }

    /// Remove every session field. Settings and the report cache stay.
    pub fn clear_session(&self) -> Result<(), StoreError> {
        self.update(|s| s.session = None)
    }

    // ============= REPORT CACHE =============

    pub fn cached_reports(&self) -> Vec<CachedReport> {
        self.read(|s| s.report_cache.clone())
    }

    pub fn cache_report(&self, entry: CachedReport) -> Result<(), StoreError> {
        self.update(|s| s.report_cache.push(entry))
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &ClientState) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        // Write to a sibling file first so a crash never leaves half a document
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}
