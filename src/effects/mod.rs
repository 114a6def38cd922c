//! Signal transformations applied to device tracks.

pub mod blur;
pub mod bokeh;
pub mod noise;
pub mod segmenter;

use std::{fmt, rc::Rc};

use async_trait::async_trait;
use derive_more::Display;
use futures::{
    future::{self, Either, LocalBoxFuture},
    stream, FutureExt as _, StreamExt as _,
};
use local_media_reactive::{ObservableCell, Publisher, Shared};
use serde_json::Value;
use tracerr::Traced;

use crate::{
    media::{track::StopOnDrop, Track, TrackOrigin},
    platform,
    settings::{SettingsStore, BLUR_VIDEO_KEY, SUPPRESS_NOISE_KEY},
};

#[doc(inline)]
pub use self::{
    blur::BackgroundBlur,
    noise::NoiseSuppression,
    segmenter::{
        ForegroundMask, SegmentationError, Segmenter, SegmenterCache,
        SegmenterLoader,
    },
};

/// Kinds of effects.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum EffectKind {
    /// Background blur of video.
    #[display(fmt = "background blur")]
    Blur,

    /// Noise suppression of audio.
    #[display(fmt = "noise suppression")]
    NoiseSuppression,
}

impl EffectKind {
    /// Returns key of this effect's persisted flag.
    #[inline]
    #[must_use]
    pub fn settings_key(self) -> &'static str {
        match self {
            Self::Blur => BLUR_VIDEO_KEY,
            Self::NoiseSuppression => SUPPRESS_NOISE_KEY,
        }
    }
}

/// Errors of starting an effect.
#[derive(Clone, Debug, Display)]
pub enum EffectError {
    /// Segmentation engine failed.
    #[display(fmt = "{}", _0)]
    Segmentation(SegmentationError),

    /// Platform API failed.
    #[display(fmt = "Platform error: {}", _0)]
    Platform(platform::Error),

    /// Source track doesn't report its frame size.
    #[display(fmt = "Source track has no frame size")]
    NoFrameSize,

    /// Source track has no frame to render yet.
    #[display(fmt = "Source track has no frames")]
    NoFrame,
}

impl From<SegmentationError> for EffectError {
    #[inline]
    fn from(err: SegmentationError) -> Self {
        Self::Segmentation(err)
    }
}

impl From<platform::Error> for EffectError {
    #[inline]
    fn from(err: platform::Error) -> Self {
        Self::Platform(err)
    }
}

/// Transformation producing a derived [`Track`] out of a raw one.
#[async_trait(?Send)]
pub trait TrackEffect {
    /// Returns [`EffectKind`] of this effect.
    fn kind(&self) -> EffectKind;

    /// Starts this effect over the provided `raw` [`Track`], returning the
    /// transformed one.
    ///
    /// The returned [`Track`] ends once the `raw` one ends, and releases
    /// everything the effect holds once it ends.
    async fn wrap(&self, raw: &Track) -> Result<Track, Traced<EffectError>>;
}

/// Persisted effect toggles.
pub struct EffectSettings {
    store: Rc<dyn SettingsStore>,
    blur: Rc<ObservableCell<bool>>,
    noise_suppression: Rc<ObservableCell<bool>>,
}

impl fmt::Debug for EffectSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSettings")
            .field("blur", &self.blur.get())
            .field("noise_suppression", &self.noise_suppression.get())
            .finish()
    }
}

impl EffectSettings {
    /// Loads [`EffectSettings`] from the provided `store`. Missing or
    /// malformed flags are off.
    #[must_use]
    pub fn load(store: Rc<dyn SettingsStore>) -> Self {
        let flag = |kind: EffectKind| {
            let enabled = match store.get(kind.settings_key()) {
                Some(Value::Bool(enabled)) => enabled,
                None | Some(Value::Null) => false,
                Some(other) => {
                    log::warn!(
                        "Ignoring malformed `{}` setting: {}",
                        kind.settings_key(),
                        other,
                    );
                    false
                }
            };
            Rc::new(ObservableCell::new(enabled))
        };
        Self {
            blur: flag(EffectKind::Blur),
            noise_suppression: flag(EffectKind::NoiseSuppression),
            store,
        }
    }

    /// Returns the flag of the provided effect `kind`.
    #[inline]
    #[must_use]
    pub fn flag(&self, kind: EffectKind) -> &Rc<ObservableCell<bool>> {
        match kind {
            EffectKind::Blur => &self.blur,
            EffectKind::NoiseSuppression => &self.noise_suppression,
        }
    }

    /// Indicates whether the effect of the provided `kind` is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.flag(kind).get()
    }

    /// Enables or disables the effect of the provided `kind`, persisting the
    /// choice.
    ///
    /// A failure to persist is logged, the flag is changed anyway.
    pub fn set_enabled(&self, kind: EffectKind, enabled: bool) {
        if let Err(e) = self.store.set(kind.settings_key(), enabled.into()) {
            log::error!(
                "Failed to persist `{}` setting: {}",
                kind.settings_key(),
                e,
            );
        }
        self.flag(kind).set(enabled);
    }
}

/// Input of the [`apply()`] producer.
enum Input {
    Raw(Track),
    Enabled(bool),
}

/// Event the [`apply()`] producer reacts to.
enum Event {
    Input(Option<Input>),
    Wrapped(Result<Track, Traced<EffectError>>),
}

/// Effect being started over a raw [`Track`].
type PendingWrap = (
    Track,
    LocalBoxFuture<'static, Result<Track, Traced<EffectError>>>,
);

/// Returns the output of `raw` with the provided `effect` applied while its
/// `enabled` flag is set.
///
/// The effect is applied to live device [`Track`]s only, placeholders pass
/// through untouched. If the effect fails to start, the raw [`Track`] passes
/// through and the failure is logged.
///
/// Inputs are applied in the order they arrive: a starting effect is dropped
/// as soon as a newer input makes it obsolete.
pub fn apply(
    raw: Shared<Track>,
    enabled: Rc<ObservableCell<bool>>,
    effect: Rc<dyn TrackEffect>,
) -> Shared<Track> {
    Shared::new(move |publisher: Publisher<Track>| {
        let raw = raw.subscribe().map(Input::Raw);
        let enabled = enabled.subscribe().map(Input::Enabled);
        let effect = Rc::clone(&effect);
        async move {
            let mut inputs = stream::select(raw, enabled);
            let mut current_raw = None;
            let mut current_enabled = None;
            let mut wrapped: Option<StopOnDrop> = None;
            let mut pending: Option<PendingWrap> = None;

            loop {
                let event = match &mut pending {
                    Some((_, wrap)) => {
                        match future::select(inputs.next(), wrap).await {
                            Either::Left((input, _)) => Event::Input(input),
                            Either::Right((res, _)) => Event::Wrapped(res),
                        }
                    }
                    None => Event::Input(inputs.next().await),
                };
                match event {
                    Event::Input(None) => break,
                    Event::Input(Some(Input::Raw(track))) => {
                        current_raw = Some(track);
                    }
                    Event::Input(Some(Input::Enabled(on))) => {
                        current_enabled = Some(on);
                    }
                    Event::Wrapped(result) => {
                        let raw = match pending.take() {
                            Some((raw, _)) => raw,
                            None => continue,
                        };
                        let output = match result {
                            Ok(track) => {
                                log::debug!(
                                    "Applied {} to track {}",
                                    effect.kind(),
                                    raw.id(),
                                );
                                wrapped = Some(StopOnDrop(track.clone()));
                                track
                            }
                            Err(e) => {
                                log::error!(
                                    "Failed to apply {}, passing track {} \
                                     through: {}",
                                    effect.kind(),
                                    raw.id(),
                                    e,
                                );
                                wrapped = None;
                                raw
                            }
                        };
                        let _ = publisher.publish(output);
                        continue;
                    }
                }
                let (raw, on) = match (&current_raw, current_enabled) {
                    (Some(raw), Some(on)) => (raw.clone(), on),
                    _ => continue,
                };

                let applicable = on
                    && raw.origin() == TrackOrigin::Device
                    && raw.is_live();
                if !applicable {
                    if let Some((track, _)) = pending.take() {
                        log::debug!(
                            "Dropping {} of track {} being started",
                            effect.kind(),
                            track.id(),
                        );
                    }
                    wrapped = None;
                    let _ = publisher.publish(raw);
                    continue;
                }

                let reusable = wrapped.as_ref().filter(|w| {
                    w.0.parent() == Some(&raw) && w.0.is_live()
                });
                if let Some(w) = reusable {
                    pending = None;
                    let _ = publisher.publish(w.0.clone());
                    continue;
                }
                if matches!(&pending, Some((track, _)) if *track == raw) {
                    continue;
                }
                let wrap = {
                    let (effect, raw) = (Rc::clone(&effect), raw.clone());
                    async move { effect.wrap(&raw).await }.boxed_local()
                };
                pending = Some((raw, wrap));
            }
        }
    })
}
