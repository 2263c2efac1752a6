//! Client-held session storage
//!
//! The (uid, token) pair lives in exactly one store per client context. Both
//! values are written together and cleared together; a store holding only
//! one of them holds no session.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Result;

/// An authenticated principal and its bearer token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub token: String,
}

impl Session {
    pub fn new(uid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            token: token.into(),
        }
    }
}

// Bearer tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Atomic load/save/clear of the current session
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;

    fn save(&self, session: &Session) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Clear only if `expected` is still the stored session.
    ///
    /// Returns whether anything was cleared. Implementations should make the
    /// compare and the clear a single step.
    fn clear_if(&self, expected: &Session) -> Result<bool> {
        if self.load()?.as_ref() == Some(expected) {
            self.clear()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemorySessionStore {
    current: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            current: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        // The slot is plain data; a panic elsewhere cannot leave it half-written.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }

    fn clear_if(&self, expected: &Session) -> Result<bool> {
        let mut slot = self.slot();
        if slot.as_ref() == Some(expected) {
            *slot = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// On-disk form; either field may be missing in a damaged file.
#[derive(Serialize, Deserialize, Default)]
struct StoredSession {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// JSON file store, the command-line client's cookie jar
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers never see a partial pair. On Unix the file is owner-only.
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> Result<Option<Session>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSession = match serde_json::from_str(&json) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                return Ok(None);
            }
        };

        match (stored.uid, stored.token) {
            (Some(uid), Some(token)) if !uid.is_empty() && !token.is_empty() => {
                Ok(Some(Session { uid, token }))
            }
            _ => Ok(None),
        }
    }

    fn write(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored = StoredSession {
            uid: Some(session.uid.clone()),
            token: Some(session.token.clone()),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let _guard = self.guard();
        self.read()
    }

    fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.guard();
        self.write(session)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        self.remove()
    }

    fn clear_if(&self, expected: &Session) -> Result<bool> {
        let _guard = self.guard();
        if self.read()?.as_ref() == Some(expected) {
            self.remove()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
