//! File-backed session storage
//!
//! Each session owns one JSON file named after its id. Reopening the same id
//! (a reload) sees the values written before; a new id starts empty, and
//! [`FileSessionStorage::destroy`] ends the session by deleting the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use authwire_core::SessionStorage;
use authwire_domain::{AuthWireError, Result};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::errors::InfraError;

#[derive(Debug)]
pub struct FileSessionStorage {
    session_id: Uuid,
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStorage {
    /// Start a new session in `dir`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir, Uuid::new_v4())
    }

    /// Open the session `session_id`, loading whatever it persisted before.
    ///
    /// # Errors
    /// Returns `AuthWireError::Storage` if the directory cannot be created or
    /// the file cannot be read, and `AuthWireError::Serialization` if it is
    /// not a JSON object of strings.
    pub fn open(dir: impl AsRef<Path>, session_id: Uuid) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(to_storage_error)?;

        let path = dir.join(format!("{session_id}.json"));
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(to_storage_error)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(
            session = %session_id,
            path = %path.display(),
            keys = entries.len(),
            "session storage opened"
        );
        Ok(Self { session_id, path, entries: Mutex::new(entries) })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End the session and delete its file.
    pub fn destroy(self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(to_storage_error(err)),
        }
    }

    /// Write the whole map through a temporary file and rename it into place.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, bytes).map_err(to_storage_error)?;
        std::fs::rename(&staging, &self.path).map_err(to_storage_error)
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }

    /// The whole batch lands in a single rename.
    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        for (key, value) in changes {
            match value {
                Some(value) => next.insert((*key).to_string(), (*value).to_string()),
                None => next.remove(*key),
            };
        }
        if next == *entries {
            return Ok(());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

fn to_storage_error(err: std::io::Error) -> AuthWireError {
    InfraError::from(err).into()
}
