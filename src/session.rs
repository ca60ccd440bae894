//! Persistent session state: access token, refresh token and selected role.
//!
//! Both the login flow and the authenticated client go through the
//! [`SessionStore`] trait, so tests can swap the on-disk store for
//! [`MemorySessionStore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionKey {
    AccessToken,
    RefreshToken,
    Role,
}

impl SessionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "access_token",
            SessionKey::RefreshToken => "refresh_token",
            SessionKey::Role => "userRole",
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Option<String>;
    fn set(&self, key: SessionKey, value: &str);
    fn clear(&self, key: SessionKey);

    /// Drop both tokens, keeping the role.
    fn clear_tokens(&self) {
        self.clear(SessionKey::AccessToken);
        self.clear(SessionKey::RefreshToken);
    }

    fn clear_all(&self) {
        self.clear_tokens();
        self.clear(SessionKey::Role);
    }
}

type Entries = BTreeMap<String, String>;

fn read_entries(lock: &RwLock<Entries>) -> RwLockReadGuard<'_, Entries> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_entries(lock: &RwLock<Entries>) -> RwLockWriteGuard<'_, Entries> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<Entries>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        read_entries(&self.entries).get(key.as_str()).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        write_entries(&self.entries).insert(key.as_str().to_string(), value.to_string());
    }

    fn clear(&self, key: SessionKey) {
        write_entries(&self.entries).remove(key.as_str());
    }
}

/// JSON-file backed store, rewritten on every mutation.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl FileSessionStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: PathBuf) -> Self {
        let entries = match Self::load(&path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("ignoring unreadable session file {}: {}", path.display(), err);
                Entries::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    fn load(path: &Path) -> Result<Entries, SessionError> {
        if !path.exists() {
            return Ok(Entries::new());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self, entries: &Entries) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        debug!("session written to {}", self.path.display());
        Ok(())
    }

    fn mutate(&self, f: impl FnOnce(&mut Entries)) {
        let mut entries = write_entries(&self.entries);
        f(&mut entries);
        if let Err(err) = self.persist(&entries) {
            warn!("failed to persist session to {}: {}", self.path.display(), err);
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        read_entries(&self.entries).get(key.as_str()).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        self.mutate(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
        });
    }

    fn clear(&self, key: SessionKey) {
        self.mutate(|entries| {
            entries.remove(key.as_str());
        });
    }
}
