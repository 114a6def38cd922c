//! Composition of device capture, effects and screen sharing into the
//! observable local media surface.

use std::{fmt, rc::Rc, sync::Arc};

use derive_more::Display;
use futures::stream::LocalBoxStream;
use local_media_reactive::{Shared, Subscription};
use tracerr::Traced;

use crate::{
    conf::{self, Conf},
    effects::{
        self, BackgroundBlur, EffectKind, EffectSettings, NoiseSuppression,
        SegmenterCache,
    },
    media::{
        DevicePriority, DeviceTrackSource, GateState, InputDeviceInfo,
        MediaKind, ScreenShare, ScreenShareOptions, Track, TrackGate,
        UnavailabilityReason,
    },
    platform::{self, MediaDevices, NoiseSuppressor, SurfaceFactory},
    settings::{JsonFileStore, MemoryStore, SettingsError, SettingsStore},
};

/// Errors of selecting a preferred device.
#[derive(Clone, Debug, Display)]
pub enum SelectDeviceError {
    /// No device with the provided ID is currently available.
    #[display(fmt = "Device `{}` is not available", _0)]
    UnknownDevice(String),

    /// Devices couldn't be enumerated.
    #[display(fmt = "Failed to enumerate devices: {}", _0)]
    Platform(platform::Error),
}

impl From<platform::Error> for SelectDeviceError {
    #[inline]
    fn from(err: platform::Error) -> Self {
        Self::Platform(err)
    }
}

/// Collaborators provided by the embedding platform.
pub struct Platform {
    /// Capture devices.
    pub media_devices: Rc<dyn MediaDevices>,

    /// Rendering surfaces of the background blur.
    pub surfaces: Rc<dyn SurfaceFactory>,

    /// Noise suppression transform.
    pub noise_suppressor: Rc<dyn NoiseSuppressor>,

    /// Storage of persisted user settings.
    pub settings: Rc<dyn SettingsStore>,

    /// Segmentation engine of the background blur.
    ///
    /// Usually the process-wide one returned by
    /// [`SegmenterCache::global_or_install()`].
    pub segmenters: Arc<SegmenterCache>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("segmenters", &self.segmenters)
            .finish()
    }
}

/// Opens the [`SettingsStore`] configured by the provided `conf`: a
/// [`JsonFileStore`] if a path is set, or a [`MemoryStore`] otherwise.
///
/// # Errors
///
/// If the configured file cannot be read.
pub fn open_settings_store(
    conf: &conf::Settings,
) -> Result<Rc<dyn SettingsStore>, Traced<SettingsError>> {
    let store: Rc<dyn SettingsStore> = match &conf.path {
        Some(path) => {
            Rc::new(JsonFileStore::open(path).map_err(tracerr::wrap!())?)
        }
        None => Rc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Local media of a user: camera, microphone and screen share, with effects
/// applied and device preferences persisted.
///
/// Outputs are acquired lazily: a device is captured only while its kind is
/// enabled and somebody observes the output. Any number of observers share
/// one capture.
pub struct UserMedia {
    media_devices: Rc<dyn MediaDevices>,
    priority: Rc<DevicePriority>,
    effects: EffectSettings,
    camera_gate: TrackGate,
    microphone_gate: TrackGate,

    /// Camera output with background blur applied.
    camera: Shared<Track>,

    /// Microphone output with noise suppression applied.
    microphone: Shared<Track>,

    screen: ScreenShare,
    screen_options: ScreenShareOptions,
}

impl fmt::Debug for UserMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserMedia")
            .field("camera", &self.camera_gate)
            .field("microphone", &self.microphone_gate)
            .field("effects", &self.effects)
            .field("screen", &self.screen)
            .finish()
    }
}

impl UserMedia {
    /// Creates new [`UserMedia`] with everything disabled.
    #[must_use]
    pub fn new(conf: &Conf, platform: Platform) -> Self {
        let Platform {
            media_devices,
            surfaces,
            noise_suppressor,
            settings,
            segmenters,
        } = platform;

        let priority = Rc::new(DevicePriority::new(Rc::clone(&settings)));
        let effects = EffectSettings::load(settings);
        let gate = |kind| {
            TrackGate::new(
                Rc::new(DeviceTrackSource::new(
                    kind,
                    Rc::clone(&media_devices),
                    Rc::clone(&priority),
                    conf.devices.attempts_per_device,
                )),
                Rc::clone(&media_devices),
            )
        };
        let camera_gate = gate(MediaKind::Video);
        let microphone_gate = gate(MediaKind::Audio);

        let camera = effects::apply(
            camera_gate.output().clone(),
            Rc::clone(effects.flag(EffectKind::Blur)),
            Rc::new(BackgroundBlur::new(
                segmenters,
                surfaces,
                &conf.effects.blur,
            )),
        );
        let microphone = effects::apply(
            microphone_gate.output().clone(),
            Rc::clone(effects.flag(EffectKind::NoiseSuppression)),
            Rc::new(NoiseSuppression::new(noise_suppressor)),
        );
        let screen_options = conf.screen_share.options();
        let screen =
            ScreenShare::new(Rc::clone(&media_devices), screen_options);

        Self {
            media_devices,
            priority,
            effects,
            camera_gate,
            microphone_gate,
            camera,
            microphone,
            screen,
            screen_options,
        }
    }

    fn gate(&self, kind: MediaKind) -> &TrackGate {
        match kind {
            MediaKind::Audio => &self.microphone_gate,
            MediaKind::Video => &self.camera_gate,
        }
    }

    /// Returns the output of the provided `kind`.
    #[inline]
    #[must_use]
    pub fn output(&self, kind: MediaKind) -> &Shared<Track> {
        match kind {
            MediaKind::Audio => &self.microphone,
            MediaKind::Video => &self.camera,
        }
    }

    /// Subscribes to the camera output: the live (possibly blurred) camera
    /// [`Track`], or a placeholder.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub fn camera(&self) -> Subscription<Track> {
        self.camera.subscribe()
    }

    /// Subscribes to the microphone output: the live (possibly
    /// noise-suppressed) microphone [`Track`], or a placeholder.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub fn microphone(&self) -> Subscription<Track> {
        self.microphone.subscribe()
    }

    /// Enables or disables capturing of the provided `kind`.
    #[inline]
    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) {
        self.gate(kind).set_enabled(enabled);
    }

    /// Indicates whether capturing of the provided `kind` is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        self.gate(kind).is_enabled()
    }

    /// Returns a [`Stream`] of the enabled flag changes of the provided
    /// `kind`, starting with the current value.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_enabled_change(
        &self,
        kind: MediaKind,
    ) -> LocalBoxStream<'static, bool> {
        self.gate(kind).on_enabled_change()
    }

    /// Returns [`GateState`] of the provided `kind`.
    #[inline]
    #[must_use]
    pub fn gate_state(&self, kind: MediaKind) -> GateState {
        self.gate(kind).state()
    }

    /// Returns why the last capture of the provided `kind` failed, unless a
    /// later one has succeeded.
    #[inline]
    #[must_use]
    pub fn unavailability_reason(
        &self,
        kind: MediaKind,
    ) -> Option<UnavailabilityReason> {
        self.gate(kind).unavailability_reason()
    }

    /// Returns a [`Stream`] of [`UserMedia::unavailability_reason()`]
    /// changes, starting with the current one.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_unavailability_reason_change(
        &self,
        kind: MediaKind,
    ) -> LocalBoxStream<'static, Option<UnavailabilityReason>> {
        self.gate(kind).on_unavailability_reason_change()
    }

    /// Enables or disables background blur of the camera, persisting the
    /// choice.
    #[inline]
    pub fn set_blur_enabled(&self, enabled: bool) {
        self.effects.set_enabled(EffectKind::Blur, enabled);
    }

    /// Indicates whether background blur is enabled.
    #[inline]
    #[must_use]
    pub fn is_blur_enabled(&self) -> bool {
        self.effects.is_enabled(EffectKind::Blur)
    }

    /// Returns a [`Stream`] of background blur flag changes, starting with
    /// the current value.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_blur_enabled_change(&self) -> LocalBoxStream<'static, bool> {
        self.effects.flag(EffectKind::Blur).subscribe()
    }

    /// Enables or disables noise suppression of the microphone, persisting
    /// the choice.
    #[inline]
    pub fn set_noise_suppression_enabled(&self, enabled: bool) {
        self.effects.set_enabled(EffectKind::NoiseSuppression, enabled);
    }

    /// Indicates whether noise suppression is enabled.
    #[inline]
    #[must_use]
    pub fn is_noise_suppression_enabled(&self) -> bool {
        self.effects.is_enabled(EffectKind::NoiseSuppression)
    }

    /// Returns a [`Stream`] of noise suppression flag changes, starting
    /// with the current value.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_noise_suppression_enabled_change(
        &self,
    ) -> LocalBoxStream<'static, bool> {
        self.effects.flag(EffectKind::NoiseSuppression).subscribe()
    }

    /// Makes the device with the provided `device_id` the preferred one of
    /// its `kind`.
    ///
    /// A running capture is not switched, the preference applies to the
    /// next one.
    ///
    /// # Errors
    ///
    /// With [`SelectDeviceError::UnknownDevice`] if no such device of the
    /// `kind` is available.
    ///
    /// With [`SelectDeviceError::Platform`] if devices cannot be
    /// enumerated.
    pub async fn set_device_id(
        &self,
        kind: MediaKind,
        device_id: &str,
    ) -> Result<(), Traced<SelectDeviceError>> {
        let devices = self
            .media_devices
            .enumerate_devices()
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        let known = devices
            .iter()
            .any(|d| d.kind() == kind && d.device_id() == device_id);
        if !known {
            return Err(tracerr::new!(SelectDeviceError::UnknownDevice(
                device_id.to_owned()
            )));
        }
        self.priority.prefer(kind, device_id);
        Ok(())
    }

    /// Lists currently available devices of the provided `kind`, most
    /// preferred first.
    ///
    /// # Errors
    ///
    /// If devices cannot be enumerated.
    pub async fn enumerate_devices(
        &self,
        kind: MediaKind,
    ) -> Result<Vec<InputDeviceInfo>, Traced<platform::Error>> {
        let devices = self
            .media_devices
            .enumerate_devices()
            .await
            .map_err(tracerr::wrap!())?;
        Ok(self.priority.order(kind, devices))
    }

    /// Returns ID of the device captured by the current camera output, if
    /// it's live.
    #[must_use]
    pub fn video_device_id(&self) -> Option<String> {
        Self::device_id_of(&self.camera)
    }

    /// Returns ID of the device captured by the current microphone output,
    /// if it's live.
    #[must_use]
    pub fn audio_device_id(&self) -> Option<String> {
        Self::device_id_of(&self.microphone)
    }

    fn device_id_of(output: &Shared<Track>) -> Option<String> {
        output
            .current()
            .filter(|t| t.is_live() && !t.is_placeholder())
            .and_then(|t| t.device_id())
    }

    /// Starts sharing a screen with the provided `options`.
    ///
    /// Returns [`None`] if the user denied or cancelled the capture.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub async fn start_screen_share(
        &self,
        options: ScreenShareOptions,
    ) -> Option<Track> {
        self.screen.start(options).await
    }

    /// Starts sharing a screen with the configured options.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub async fn start_screen_share_default(&self) -> Option<Track> {
        self.screen.start(self.screen_options).await
    }

    /// Stops sharing the screen.
    #[inline]
    pub fn stop_screen_share(&self) {
        self.screen.stop();
    }

    /// Subscribes to the screen share [`Track`].
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub fn screen_share(&self) -> Subscription<Option<Track>> {
        self.screen.subscribe()
    }

    /// Returns the screen share output.
    #[inline]
    #[must_use]
    pub fn screen_share_output(&self) -> &Shared<Option<Track>> {
        self.screen.output()
    }

    /// Returns the currently shared screen [`Track`], if any.
    #[inline]
    #[must_use]
    pub fn current_screen_share(&self) -> Option<Track> {
        self.screen.current()
    }

    /// Indicates whether screen sharing is enabled.
    #[inline]
    #[must_use]
    pub fn is_screen_share_enabled(&self) -> bool {
        self.screen.is_enabled()
    }

    /// Returns a [`Stream`] of screen sharing flag changes, starting with
    /// the current value.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_screen_share_enabled_change(
        &self,
    ) -> LocalBoxStream<'static, bool> {
        self.screen.on_enabled_change()
    }
}
