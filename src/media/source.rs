//! Acquisition of device tracks with fallback across candidate devices.

use std::{collections::HashMap, fmt, rc::Rc};

use tracerr::Traced;

use crate::platform::MediaDevices;

use super::{
    AcquireError, DevicePriority, MediaKind, Track, TrackOrigin,
    UnavailabilityReason,
};

/// Source of live device [`Track`]s of one [`MediaKind`].
pub struct DeviceTrackSource {
    kind: MediaKind,
    media_devices: Rc<dyn MediaDevices>,
    priority: Rc<DevicePriority>,

    /// How many times each candidate device is tried in one acquisition
    /// cycle before moving to the next one.
    attempts_per_device: u32,
}

impl fmt::Debug for DeviceTrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTrackSource")
            .field("kind", &self.kind)
            .field("attempts_per_device", &self.attempts_per_device)
            .finish()
    }
}

impl DeviceTrackSource {
    /// Creates a new [`DeviceTrackSource`] of the provided `kind`.
    ///
    /// `attempts_per_device` is clamped to at least one.
    #[must_use]
    pub fn new(
        kind: MediaKind,
        media_devices: Rc<dyn MediaDevices>,
        priority: Rc<DevicePriority>,
        attempts_per_device: u32,
    ) -> Self {
        Self {
            kind,
            media_devices,
            priority,
            attempts_per_device: attempts_per_device.max(1),
        }
    }

    /// Returns [`MediaKind`] of this [`DeviceTrackSource`].
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Acquires a live device [`Track`].
    ///
    /// Candidate devices are tried in the [`DevicePriority`] order, devices
    /// being enumerated anew before every attempt. A device-specific failure
    /// moves on to the next candidate, any other failure is returned at once.
    ///
    /// `is_cancelled` is checked before every attempt.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::NoDevices`] if no device of the kind is connected.
    /// - [`AcquireError::DevicesExhausted`] if every candidate failed.
    /// - [`AcquireError::Platform`] on a non device-specific failure.
    /// - [`AcquireError::Cancelled`] if `is_cancelled` returned `true`.
    pub async fn acquire(
        &self,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<Track, Traced<AcquireError>> {
        let mut attempts: HashMap<String, u32> = HashMap::new();
        loop {
            if is_cancelled() {
                return Err(tracerr::new!(AcquireError::Cancelled));
            }

            let devices = self
                .media_devices
                .enumerate_devices()
                .await
                .map_err(tracerr::map_from_and_wrap!())?;
            let candidates = self.priority.order(self.kind, devices);
            if candidates.is_empty() {
                return Err(tracerr::new!(AcquireError::NoDevices(self.kind)));
            }
            let device_id = candidates
                .into_iter()
                .map(|d| d.device_id().to_owned())
                .find(|id| {
                    attempts.get(id).copied().unwrap_or(0)
                        < self.attempts_per_device
                });
            let device_id = match device_id {
                Some(id) => id,
                None => {
                    return Err(tracerr::new!(AcquireError::DevicesExhausted(
                        self.kind
                    )));
                }
            };
            *attempts.entry(device_id.clone()).or_insert(0) += 1;

            if is_cancelled() {
                return Err(tracerr::new!(AcquireError::Cancelled));
            }
            log::debug!("Acquiring {} device `{}`", self.kind, device_id);
            match self
                .media_devices
                .get_user_media(self.kind, Some(device_id.clone()))
                .await
            {
                Ok(track) => return Ok(Track::new(track, TrackOrigin::Device)),
                Err(e) => {
                    let reason = UnavailabilityReason::from(e.as_ref());
                    if !reason.is_device_specific() {
                        return Err(e).map_err(tracerr::map_from_and_wrap!());
                    }
                    log::warn!(
                        "{} device `{}` failed, trying next one: {}",
                        self.kind,
                        device_id,
                        e,
                    );
                }
            }
        }
    }
}
