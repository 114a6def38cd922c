//! Screen sharing settings.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{media::ScreenShareOptions, platform::ContentHint};

/// Screen sharing settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct ScreenShare {
    /// [`ContentHint`] of captured screens, unless specified on start.
    ///
    /// Defaults to `text`.
    #[default(ContentHint::Text)]
    pub content_hint: ContentHint,
}

impl ScreenShare {
    /// Returns the default [`ScreenShareOptions`].
    #[inline]
    #[must_use]
    pub fn options(&self) -> ScreenShareOptions {
        ScreenShareOptions {
            content_hint: self.content_hint,
        }
    }
}
