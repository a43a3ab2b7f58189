//! Persistent credential storage
//!
//! A flat string key/value store, the way a browser's local storage holds
//! `access_token` and the JSON-encoded `user`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::PathBuf;

use crate::error::StorageError;

/// Key of the opaque access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key of the JSON-encoded user
pub const USER_KEY: &str = "user";

/// String key/value storage that survives restarts
pub trait CredentialStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Credential store backed by a JSON file
///
/// Every write rewrites the whole file; the store holds two small keys.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileCredentialStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                StorageError::Corrupt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StorageError::ReadError {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened credential store");
        Ok(Self { path, entries })
    }

    /// Open the store, starting empty if the file is unreadable or corrupt
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Failed to open credential store: {}, starting empty", e);
                Self {
                    path,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    fn flush(&self) -> Result<(), StorageError> {
        let write_err = |source| StorageError::WriteError {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = File::create(&self.path).map_err(write_err)?;
        restrict_to_owner(&file).map_err(write_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.entries).map_err(|e| {
            StorageError::WriteError {
                path: self.path.display().to_string(),
                source: e.into(),
            }
        })
    }
}

/// The file holds a bearer token: owner read/write only
#[cfg(unix)]
fn restrict_to_owner(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = file.metadata()?.permissions();
    perms.set_mode(0o600);
    file.set_permissions(perms)
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &File) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Credential store that lives only as long as the process
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}
