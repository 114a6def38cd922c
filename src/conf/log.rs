//! Logging settings.

use std::{borrow::Cow, str::FromStr as _};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Logging settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Log {
    /// Lowest level of records being logged: `TRACE`, `DEBUG`, `INFO`,
    /// `WARN`, `ERROR` or `CRITICAL`. Anything else turns logging off.
    ///
    /// Defaults to `INFO`.
    #[default(Cow::Borrowed("INFO"))]
    pub level: Cow<'static, str>,
}

impl Log {
    /// Parses the configured [`Log::level`], returning [`None`] if logging is
    /// turned off.
    #[must_use]
    pub fn level(&self) -> Option<slog::Level> {
        slog::Level::from_str(self.level.trim()).ok()
    }
}
