//! Key/value slot storage used for durable local state.
//!
//! The map persists its points of interest as one JSON document in a named
//! slot. This module provides the `StorageBackend` trait and two backends:
//!
//! - `FileStorage`: a single JSON file holding a map of slot name
//!   to string value, read once on open and flushed synchronously on every
//!   mutation.
//! - `MemoryStorage`: process-local, used in tests and as a fallback when no
//!   file location is usable.

use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Platform storage error: {0}")]
    Platform(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String slot storage.
///
/// Keys and values are UTF-8 strings. Structured data goes through
/// [`save_json`] / [`load_json`].
pub trait StorageBackend: Send + Sync {
    /// Store a string value for a key.
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read a string value for a key. Returns Ok(None) when key is missing.
    fn get_string(&self, key: &str) -> StorageResult<Option<String>>;
}

/// Serialize `value` as JSON into the slot `key`.
pub fn save_json<T: Serialize + ?Sized>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let s = serde_json::to_string(value).map_err(|e| StorageError::Json(e.to_string()))?;
    backend.set_string(key, &s)
}

/// Read and deserialize the slot `key`. A missing slot is `Ok(None)`.
pub fn load_json<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get_string(key)? {
        Some(s) => serde_json::from_str::<T>(&s)
            .map(Some)
            .map_err(|e| StorageError::Json(e.to_string())),
        None => Ok(None),
    }
}

fn lock_poisoned<E: std::fmt::Debug>(e: E) -> StorageError {
    StorageError::Platform(format!("mutex poisoned: {:?}", e))
}

/// In-memory slots, lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.get(key).cloned())
    }
}

/// File-based storage: one JSON file which is a map of key -> string value.
pub struct FileStorage {
    /// Path to the backing JSON file.
    path: PathBuf,
    /// In-memory copy of key -> value
    inner: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Per-user default location:
    /// - On Windows: %APPDATA%/FjordMap/storage.json
    /// - Else: $HOME/.config/fjord-map/storage.json
    pub fn default_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("FjordMap").join("storage.json");
        }

        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home)
                .join(".config")
                .join("fjord-map")
                .join("storage.json");
        }

        Path::new(".").join("fjord-map-storage.json")
    }

    /// Open (or lazily create) the storage file at `path`.
    ///
    /// A file whose contents are not a UTF-8 JSON string map is treated as empty
    /// and left untouched until the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create storage parent directory: {}", e))
            })?;
        }

        let mut map: HashMap<String, String> = HashMap::new();
        if path.exists() {
            let bytes = fs::read(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read storage file: {}", e)))?;
            let s = String::from_utf8(bytes).unwrap_or_else(|e| {
                tracing::warn!(
                    "Storage file {} is not valid UTF-8, starting empty: {}",
                    path.display(),
                    e
                );
                String::new()
            });
            if !s.trim().is_empty() {
                match serde_json::from_str::<HashMap<String, String>>(&s) {
                    Ok(m) => map = m,
                    Err(e) => {
                        tracing::warn!(
                            "Storage file {} is not valid JSON, starting empty: {}",
                            path.display(),
                            e
                        );
                    }
                }
            }
        }

        tracing::debug!("Opened storage at {} ({} slots)", path.display(), map.len());

        Ok(FileStorage {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_locked(&self, locked: &HashMap<String, String>) -> StorageResult<()> {
        let s =
            serde_json::to_string_pretty(locked).map_err(|e| StorageError::Json(e.to_string()))?;
        fs::write(&self.path, s).map_err(|e| StorageError::Io(format!("write failed: {}", e)))
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        self.flush_locked(&guard)
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.get(key).cloned())
    }
}
