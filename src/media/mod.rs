//! Local media capture: devices, tracks and their lifecycle.

pub mod device_info;
pub mod error;
pub mod gate;
pub mod priority;
pub mod screen;
pub mod source;
pub mod track;

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::{
    device_info::InputDeviceInfo,
    error::{AcquireError, UnavailabilityReason},
    gate::{GateState, TrackGate},
    priority::DevicePriority,
    screen::{ScreenShare, ScreenShareOptions},
    source::DeviceTrackSource,
    track::{EndReason, Track, TrackOrigin, TrackState},
};

/// Kind of a captured media.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio captured from a microphone.
    #[display(fmt = "audio")]
    Audio,

    /// Video captured from a camera or a screen.
    #[display(fmt = "video")]
    Video,
}

impl MediaKind {
    /// Returns the [kind][1] of input devices capturing this [`MediaKind`].
    ///
    /// [1]: https://w3.org/TR/mediacapture-streams/#dom-mediadevicekind
    #[inline]
    #[must_use]
    pub fn device_kind(self) -> &'static str {
        match self {
            Self::Audio => "audioinput",
            Self::Video => "videoinput",
        }
    }
}

/// Media source type.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum MediaSourceKind {
    /// Media is sourced from some media device (webcam or microphone).
    Device,

    /// Media is obtained with screen-capture.
    Display,
}
