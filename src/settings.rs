//! Persisted user settings.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io,
    path::{Path, PathBuf},
};

use derive_more::Display;
use serde_json::Value;
use tracerr::Traced;

use crate::media::MediaKind;

/// Key of the persisted background blur flag.
pub const BLUR_VIDEO_KEY: &str = "blur-video";

/// Key of the persisted noise suppression flag.
pub const SUPPRESS_NOISE_KEY: &str = "suppress-noise";

/// Returns key of the persisted device priority list of the provided
/// [`MediaKind`].
#[must_use]
pub fn device_priority_key(kind: MediaKind) -> String {
    format!("device-priority-{}", kind.device_kind())
}

/// Errors of a [`SettingsStore`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SettingsError {
    /// Failed to read or write the backing storage.
    #[display(fmt = "Settings storage I/O failed: {}", _0)]
    Io(String),

    /// Stored data is not valid JSON.
    #[display(fmt = "Malformed settings data: {}", _0)]
    Malformed(String),
}

impl From<io::Error> for SettingsError {
    #[inline]
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Key-value storage of settings surviving process restarts.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    /// Returns the value stored under the provided `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores the provided `value` under the provided `key`.
    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> Result<(), Traced<SettingsError>>;
}

/// [`SettingsStore`] keeping values in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore(RefCell<HashMap<String, Value>>);

impl MemoryStore {
    /// Creates a new empty [`MemoryStore`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    #[inline]
    fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    #[inline]
    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> Result<(), Traced<SettingsError>> {
        drop(self.0.borrow_mut().insert(key.to_owned(), value));
        Ok(())
    }
}

/// [`SettingsStore`] persisting values as a JSON object in a file.
///
/// The whole file is rewritten on every [`SettingsStore::set()`] call.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RefCell<serde_json::Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at the provided `path`. A missing file is treated as
    /// an empty store and created on the first write.
    ///
    /// # Errors
    ///
    /// If the file exists but cannot be read or does not contain a JSON
    /// object.
    pub fn open<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, Traced<SettingsError>> {
        let path = path.as_ref().to_owned();
        let values = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(SettingsError::from)
                .map_err(tracerr::wrap!())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                serde_json::Map::new()
            }
            Err(e) => {
                return Err(tracerr::new!(SettingsError::from(e)));
            }
        };
        Ok(Self {
            path,
            values: RefCell::new(values),
        })
    }

    /// Returns path of the backing file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    #[inline]
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> Result<(), Traced<SettingsError>> {
        let data = {
            let mut values = self.values.borrow_mut();
            drop(values.insert(key.to_owned(), value));
            serde_json::to_vec_pretty(&*values)
                .map_err(SettingsError::from)
                .map_err(tracerr::wrap!())?
        };
        fs::write(&self.path, data)
            .map_err(SettingsError::from)
            .map_err(tracerr::wrap!())
    }
}
