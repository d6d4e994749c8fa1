//! Persistent token store.
//!
//! The session lives in three independent keys of a string key-value
//! storage: the access token, the refresh token and the user descriptor
//! serialised as JSON. Every `load` re-reads storage; nothing is cached in
//! memory.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Role, Session, UserDescriptor};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

pub type Entries = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session storage is malformed: {0}")]
    Malformed(String),
}

/// One mutation of a batch applied by [`KeyValueStorage::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Set(&'static str, String),
    Remove(&'static str),
}

/// String key-value storage that survives process restarts.
///
/// `apply` must make the whole batch visible at once: a reader never sees
/// half of a batch.
pub trait KeyValueStorage: Send + Sync {
    fn read(&self) -> Result<Entries, StoreError>;
    fn apply(&self, changes: &[Change]) -> Result<(), StoreError>;
}

fn apply_changes(entries: &mut Entries, changes: &[Change]) {
    for change in changes {
        match change {
            Change::Set(key, value) => {
                entries.insert((*key).to_string(), value.clone());
            }
            Change::Remove(key) => {
                entries.remove(*key);
            }
        }
    }
}

/// JSON file storage, written through a temporary file and an atomic rename.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn read(&self) -> Result<Entries, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&content).map_err(|e| StoreError::Malformed(e.to_string()))
    }

    fn apply(&self, changes: &[Change]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let mut entries = match self.read() {
            Ok(entries) => entries,
            Err(StoreError::Malformed(reason)) => {
                warn!(path = %self.path.display(), %reason, "Discarding malformed session file");
                Entries::new()
            }
            Err(e) => return Err(e),
        };

        apply_changes(&mut entries, changes);
        self.write_entries(&entries)
    }
}

/// In-process storage, for tests and for embedding without a session file.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Entries>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value, bypassing the session model.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self) -> Result<Entries, StoreError> {
        Ok(self.entries.lock().clone())
    }

    fn apply(&self, changes: &[Change]) -> Result<(), StoreError> {
        apply_changes(&mut self.entries.lock(), changes);
        Ok(())
    }
}

/// Typed access to the session kept in a [`KeyValueStorage`].
pub struct TokenStore {
    storage: Box<dyn KeyValueStorage>,
}

impl TokenStore {
    pub fn new(storage: impl KeyValueStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    /// Write every field of `session` that is present.
    ///
    /// Absent fields leave their stored value untouched, so a caller can
    /// update the access token alone.
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut changes = Vec::with_capacity(3);
        if let Some(token) = &session.access_token {
            changes.push(Change::Set(ACCESS_TOKEN_KEY, token.clone()));
        }
        if let Some(token) = &session.refresh_token {
            changes.push(Change::Set(REFRESH_TOKEN_KEY, token.clone()));
        }
        if let Some(user) = &session.user {
            changes.push(Change::Set(USER_KEY, serde_json::to_string(user)?));
        }

        if changes.is_empty() {
            return Ok(());
        }
        self.storage.apply(&changes)
    }

    /// Current session. Unreadable or malformed storage yields an empty session.
    pub fn load(&self) -> Session {
        let entries = match self.storage.read() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, treating as signed out");
                return Session::default();
            }
        };

        let token = |key: &str| {
            entries
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let user = entries
            .get(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<UserDescriptor>(raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed user descriptor");
                    None
                }
            });

        Session {
            access_token: token(ACCESS_TOKEN_KEY),
            refresh_token: token(REFRESH_TOKEN_KEY),
            user,
        }
    }

    /// Remove all session keys in one write.
    pub fn clear(&self) -> Result<(), StoreError> {
        let changes: Vec<Change> = SESSION_KEYS.iter().map(|k| Change::Remove(*k)).collect();
        self.storage.apply(&changes)
    }

    pub fn access_token(&self) -> Option<String> {
        self.load().access_token
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.load().refresh_token
    }

    pub fn user(&self) -> Option<UserDescriptor> {
        self.load().user
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.storage
            .apply(&[Change::Set(ACCESS_TOKEN_KEY, token.to_string())])
    }

    /// Merge a discovered role into the stored descriptor.
    ///
    /// `fallback` supplies the descriptor when none is stored yet. The read
    /// and the write are separate storage operations.
    pub fn record_role(
        &self,
        role: Role,
        fallback: impl FnOnce() -> UserDescriptor,
    ) -> Result<UserDescriptor, StoreError> {
        let mut user = self.user().unwrap_or_else(fallback);
        user.role = user.role.merge(role);
        self.save(&Session {
            user: Some(user.clone()),
            ..Session::default()
        })?;
        Ok(user)
    }
}
