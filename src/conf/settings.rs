//! Persisted user settings storage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persisted user settings storage.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to a JSON file the settings are persisted in.
    ///
    /// Settings live in memory only if not set.
    pub path: Option<PathBuf>,
}
