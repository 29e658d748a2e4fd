//! User preferences and the key/value store behind them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub const FACE_CONTROL_ENABLED_KEY: &str = "FaceControlEnabled";
pub const CAMERA_UNIQUE_ID_KEY: &str = "FaceControlCameraUniqueID";
pub const DOCK_RENDER_ENABLED_KEY: &str = "DockRenderEnabled";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Flat persisted key/value pairs.
pub trait KeyValueStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;
    fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, for tests and for running without a settings file.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<toml::Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock(values: &Mutex<toml::Table>) -> MutexGuard<'_, toml::Table> {
    values.lock().unwrap_or_else(|e| e.into_inner())
}

impl KeyValueStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Option<bool> {
        lock(&self.values).get(key)?.as_bool()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key)?.as_str().map(str::to_string)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        lock(&self.values).insert(key.to_string(), toml::Value::Boolean(value));
        Ok(())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.values).insert(key.to_string(), toml::Value::String(value.to_string()));
        Ok(())
    }
}

/// TOML file store. Every write rewrites the whole file.
pub struct TomlStore {
    path: PathBuf,
    values: Mutex<toml::Table>,
}

impl TomlStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => text.parse::<toml::Table>().map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "settings loaded");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, key: &str, value: toml::Value) -> Result<(), StoreError> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        let text = toml::to_string(&*values)?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, text).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for TomlStore {
    fn get_bool(&self, key: &str) -> Option<bool> {
        lock(&self.values).get(key)?.as_bool()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key)?.as_str().map(str::to_string)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.write(key, toml::Value::Boolean(value))
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, toml::Value::String(value.to_string()))
    }
}

/// Snapshot of the user's preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub face_control_enabled: bool,
    pub camera_unique_id: Option<String>,
    pub dock_render_enabled: bool,
}

impl Settings {
    /// Read preferences, defaulting anything missing to off / unset.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            face_control_enabled: store.get_bool(FACE_CONTROL_ENABLED_KEY).unwrap_or(false),
            camera_unique_id: store.get_string(CAMERA_UNIQUE_ID_KEY),
            dock_render_enabled: store.get_bool(DOCK_RENDER_ENABLED_KEY).unwrap_or(false),
        }
    }
}

/// Persist a value, logging rather than propagating failure.
pub fn persist_bool(store: &dyn KeyValueStore, key: &str, value: bool) {
    if let Err(e) = store.set_bool(key, value) {
        tracing::warn!(key, error = %e, "failed to persist setting");
    }
}

pub fn persist_string(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(e) = store.set_string(key, value) {
        tracing::warn!(key, error = %e, "failed to persist setting");
    }
}
