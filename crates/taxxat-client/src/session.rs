//! Persisted record of the signed-in identity.
//!
//! The store is the only place the client asks "is somebody logged in". It
//! never reports read failures: anything missing or unreadable is treated as
//! logged out.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Identity;


/// Fixed key of the single persisted record.
pub const SESSION_RECORD_NAME: &str = "user";

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to write session record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait SessionStore: Send + Sync {
    /// The persisted identity, or `None` when absent or malformed.
    fn load(&self) -> Option<Identity>;

    /// Replaces any existing record.
    fn save(&self, identity: &Identity) -> Result<(), SessionStoreError>;

    /// Drops the record. Never fails from the caller's point of view.
    fn clear(&self);

    fn is_authenticated(&self) -> bool {
        self.load().is_some()
    }
}

fn decode_record(raw: &str) -> Option<Identity> {
    match serde_json::from_str::<Identity>(raw) {
        Ok(identity) if identity.is_well_formed() => Some(identity),
        Ok(_) => {
            warn!("persisted session record has no email; treating as logged out");
            None
        }
        Err(err) => {
            warn!(error = %err, "persisted session record is malformed; treating as logged out");
            None
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Keeps the record as `<dir>/user.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_RECORD_NAME}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn io_error(&self, source: io::Error) -> SessionStoreError {
        SessionStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Identity> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode_record(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to read session record; treating as logged out"
                );
                None
            }
        }
    }

    fn save(&self, identity: &Identity) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_vec_pretty(identity)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        // Write, fsync, then rename: a crash never leaves half a record behind.
        let staging = self.staging_path();
        write_synced(&staging, &encoded).map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))?;

        debug!(path = %self.path.display(), "session record saved");
        Ok(())
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "session record removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to remove session record; blanking it instead"
                );
                // An empty record decodes as logged out.
                if let Err(err) = fs::write(&self.path, b"") {
                    warn!(path = %self.path.display(), error = %err, "failed to blank session record");
                }
            }
        }
    }
}

/// Process-local store. Holds the encoded record so a corrupt entry can be
/// seeded the same way one would appear on disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw_record(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
        }
    }

    pub fn with_identity(identity: &Identity) -> Result<Self, SessionStoreError> {
        Ok(Self::with_raw_record(serde_json::to_string(identity)?))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Identity> {
        let record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        record.as_deref().and_then(decode_record)
    }

    fn save(&self, identity: &Identity) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_string(identity)?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }

    fn clear(&self) {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
