//! [MediaDeviceInfo][1] related objects.
//!
//! [1]: https://w3.org/TR/mediacapture-streams/#device-info

use serde::{Deserialize, Serialize};

use super::MediaKind;

/// Representation of an input [MediaDeviceInfo][1].
///
/// [1]: https://w3.org/TR/mediacapture-streams/#device-info
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InputDeviceInfo {
    device_id: String,
    kind: MediaKind,
    label: String,
    group_id: String,
}

impl InputDeviceInfo {
    /// Creates a new [`InputDeviceInfo`].
    pub fn new<I, L, G>(
        device_id: I,
        kind: MediaKind,
        label: L,
        group_id: G,
    ) -> Self
    where
        I: Into<String>,
        L: Into<String>,
        G: Into<String>,
    {
        Self {
            device_id: device_id.into(),
            kind,
            label: label.into(),
            group_id: group_id.into(),
        }
    }

    /// Unique identifier of the represented device.
    #[inline]
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// [`MediaKind`] this device captures.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Label describing this device (for example "External USB Webcam").
    /// Empty if the device has no associated label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Group identifier of the represented device. Two devices have the
    /// same group identifier if they belong to the same physical device.
    #[inline]
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}
