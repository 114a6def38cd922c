//! Platform-provided collaborators of the local media layer.
//!
//! Everything here is implemented by the embedding platform (a browser
//! binding, a native capture backend, or a test mock) and consumed by
//! [`media`](crate::media) and [`effects`](crate::effects).

use std::{borrow::Cow, fmt, rc::Rc, time::Duration};

use async_trait::async_trait;
use derive_more::Display;
use futures::future::LocalBoxFuture;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracerr::Traced;

use crate::media::{InputDeviceInfo, MediaKind};

/// Error raised by a platform API.
///
/// Mirrors a [DOMException][1]: its `name` identifies the failure category
/// and its `message` is a human-readable description.
///
/// [1]: https://webidl.spec.whatwg.org/#idl-DOMException
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(fmt = "{}: {}", name, message)]
pub struct Error {
    name: Cow<'static, str>,
    message: String,
}

impl Error {
    /// Permission to use a device was denied.
    pub const NOT_ALLOWED: &'static str = "NotAllowedError";

    /// No device matching the request was found.
    pub const NOT_FOUND: &'static str = "NotFoundError";

    /// Device was found but could not be read (usually held by another
    /// process).
    pub const NOT_READABLE: &'static str = "NotReadableError";

    /// No device satisfies the requested constraints.
    pub const OVERCONSTRAINED: &'static str = "OverconstrainedError";

    /// Creates a new [`Error`] with the provided `name` and `message`.
    pub fn new<N, M>(name: N, message: M) -> Self
    where
        N: Into<Cow<'static, str>>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns name of this [`Error`].
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns message of this [`Error`].
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Ready state of a [`MediaStreamTrack`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaStreamTrackState {
    /// Track is producing media.
    Live,

    /// Track will never produce media again.
    Ended,
}

/// Hint about the content of a display capture, letting encoders pick
/// appropriate tradeoffs.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentHint {
    /// Text or line art, sharpness matters most.
    #[display(fmt = "text")]
    Text,

    /// Static detailed content.
    #[display(fmt = "detail")]
    Detail,

    /// Moving content, smoothness matters most.
    #[display(fmt = "motion")]
    Motion,
}

/// Single media stream provided by the platform.
pub trait MediaStreamTrack: fmt::Debug {
    /// Unique identifier of this track.
    fn id(&self) -> String;

    /// [`MediaKind`] of this track.
    fn kind(&self) -> MediaKind;

    /// Identifier of the device this track captures, if any.
    fn device_id(&self) -> Option<String>;

    /// Native width of video frames, if this is a video track.
    fn width(&self) -> Option<u32>;

    /// Native height of video frames, if this is a video track.
    fn height(&self) -> Option<u32>;

    /// Current [`MediaStreamTrackState`].
    fn ready_state(&self) -> MediaStreamTrackState;

    /// Sets the [`ContentHint`] of this track.
    fn set_content_hint(&self, hint: ContentHint);

    /// Resolves once this track is ended by the platform: device unplugged,
    /// permission revoked, or capture stopped through the system UI.
    ///
    /// Never resolves because of a [`MediaStreamTrack::stop()`] call.
    fn on_ended(&self) -> LocalBoxFuture<'static, ()>;

    /// Stops this track, releasing the underlying capture.
    fn stop(&self);
}

/// Access to capture devices.
#[async_trait(?Send)]
pub trait MediaDevices {
    /// Lists currently available input devices.
    async fn enumerate_devices(
        &self,
    ) -> Result<Vec<InputDeviceInfo>, Traced<Error>>;

    /// Starts capturing the device with the provided `device_id`, or any
    /// device of the `kind` if [`None`].
    async fn get_user_media(
        &self,
        kind: MediaKind,
        device_id: Option<String>,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<Error>>;

    /// Prompts the user for a screen to capture and starts capturing it.
    async fn get_display_media(
        &self,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<Error>>;

    /// Creates a synthetic track of the provided `kind`: silence for audio
    /// and a blank picture for video.
    fn placeholder_track(&self, kind: MediaKind) -> Rc<dyn MediaStreamTrack>;
}

/// Off-screen rendering surface bound to a source video track.
pub trait FrameSurface: fmt::Debug {
    /// Returns the current frame of the source track, if there is any yet.
    fn current_frame(&self) -> Option<RgbaImage>;

    /// Draws the provided `frame` onto this surface.
    fn render(&self, frame: RgbaImage);

    /// Returns the track capturing this surface's output.
    fn capture_track(&self) -> Rc<dyn MediaStreamTrack>;
}

/// Factory of [`FrameSurface`]s.
pub trait SurfaceFactory {
    /// Creates a new [`FrameSurface`] of the provided size reading frames
    /// from the `source` track.
    ///
    /// The surface is released once the returned [`Rc`] is dropped.
    fn create_surface(
        &self,
        source: &Rc<dyn MediaStreamTrack>,
        width: u32,
        height: u32,
    ) -> Result<Rc<dyn FrameSurface>, Traced<Error>>;
}

/// Noise suppression transform of audio tracks.
#[async_trait(?Send)]
pub trait NoiseSuppressor {
    /// Returns a new track carrying the noise-suppressed signal of the
    /// provided `track`.
    async fn suppress(
        &self,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<Error>>;
}

/// Spawns the provided [`Future`] onto the current
/// [`LocalSet`](tokio::task::LocalSet).
///
/// [`Future`]: std::future::Future
#[inline]
pub fn spawn<F>(task: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    local_media_reactive::task::spawn_detached(task);
}

/// Waits for the provided [`Duration`].
#[inline]
pub async fn delay_for(delay: Duration) {
    tokio::time::sleep(delay).await;
}
