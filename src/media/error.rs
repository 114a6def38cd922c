//! Media acquisition failures.

use derive_more::Display;

use crate::platform;

use super::MediaKind;

/// Reason of a media kind being unavailable, recorded when its acquisition
/// fails.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum UnavailabilityReason {
    /// Permission to use the device was denied.
    NotAllowed,

    /// No matching device was found.
    NotFound,

    /// Device is held by another process.
    NotReadable,

    /// No device satisfies the requested constraints.
    Overconstrained,

    /// Every candidate device failed during one acquisition cycle.
    DevicesExhausted,

    /// Unclassified failure.
    Unknown,
}

impl UnavailabilityReason {
    /// Returns a user-facing explanation of this [`UnavailabilityReason`].
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NotAllowed => {
                "Permission was denied. Grant permission and reload to enable."
            }
            Self::NotFound => "No device was found.",
            Self::NotReadable => "Device is already in use.",
            Self::Overconstrained => {
                "No device was found that meets constraints."
            }
            Self::DevicesExhausted => "All devices failed to initialize.",
            Self::Unknown => "An unknown error occurred.",
        }
    }

    /// Indicates whether this [`UnavailabilityReason`] is specific to the
    /// tried device, so another device may still succeed.
    #[inline]
    #[must_use]
    pub fn is_device_specific(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::NotReadable | Self::Overconstrained
        )
    }
}

impl From<&platform::Error> for UnavailabilityReason {
    fn from(err: &platform::Error) -> Self {
        match err.name() {
            platform::Error::NOT_ALLOWED => Self::NotAllowed,
            platform::Error::NOT_FOUND => Self::NotFound,
            platform::Error::NOT_READABLE => Self::NotReadable,
            platform::Error::OVERCONSTRAINED => Self::Overconstrained,
            _ => Self::Unknown,
        }
    }
}

/// Errors of acquiring a device track.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum AcquireError {
    /// Platform API failed.
    #[display(fmt = "Platform error: {}", _0)]
    Platform(platform::Error),

    /// No device of the kind is connected.
    #[display(fmt = "No {} input devices found", _0)]
    NoDevices(MediaKind),

    /// Every candidate device failed.
    #[display(fmt = "All {} input devices failed to initialize", _0)]
    DevicesExhausted(MediaKind),

    /// Requester of the acquisition has gone.
    #[display(fmt = "Acquisition was cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Classifies this [`AcquireError`] into an [`UnavailabilityReason`].
    #[must_use]
    pub fn reason(&self) -> UnavailabilityReason {
        match self {
            Self::Platform(err) => err.into(),
            Self::NoDevices(_) => UnavailabilityReason::NotFound,
            Self::DevicesExhausted(_) => UnavailabilityReason::DevicesExhausted,
            Self::Cancelled => UnavailabilityReason::Unknown,
        }
    }
}

impl From<platform::Error> for AcquireError {
    #[inline]
    fn from(err: platform::Error) -> Self {
        Self::Platform(err)
    }
}

#[cfg(test)]
mod spec {
    use crate::{media::MediaKind, platform};

    use super::{AcquireError, UnavailabilityReason};

    #[test]
    fn classifies_by_error_name() {
        let reason = |name: &'static str| {
            UnavailabilityReason::from(&platform::Error::new(name, "msg"))
        };

        assert_eq!(reason("NotAllowedError"), UnavailabilityReason::NotAllowed);
        assert_eq!(reason("NotFoundError"), UnavailabilityReason::NotFound);
        assert_eq!(
            reason("NotReadableError"),
            UnavailabilityReason::NotReadable,
        );
        assert_eq!(
            reason("OverconstrainedError"),
            UnavailabilityReason::Overconstrained,
        );
        assert_eq!(reason("AbortError"), UnavailabilityReason::Unknown);
        assert_eq!(reason("TypeError"), UnavailabilityReason::Unknown);
    }

    #[test]
    fn only_device_errors_are_device_specific() {
        assert!(UnavailabilityReason::NotReadable.is_device_specific());
        assert!(UnavailabilityReason::NotFound.is_device_specific());
        assert!(UnavailabilityReason::Overconstrained.is_device_specific());
        assert!(!UnavailabilityReason::NotAllowed.is_device_specific());
        assert!(!UnavailabilityReason::Unknown.is_device_specific());
        assert!(!UnavailabilityReason::DevicesExhausted.is_device_specific());
    }

    #[test]
    fn exhausted_devices_have_own_reason_and_message() {
        let err = AcquireError::DevicesExhausted(MediaKind::Video);
        assert_eq!(err.reason(), UnavailabilityReason::DevicesExhausted);
        assert_eq!(
            err.reason().message(),
            "All devices failed to initialize.",
        );
    }
}
