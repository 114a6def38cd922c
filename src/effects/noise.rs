//! Noise suppression of audio tracks.

use std::{fmt, rc::Rc};

use async_trait::async_trait;
use tracerr::Traced;

use crate::{
    media::{Track, TrackOrigin},
    platform::NoiseSuppressor,
};

use super::{EffectError, EffectKind, TrackEffect};

/// Noise suppression effect backed by a platform [`NoiseSuppressor`].
pub struct NoiseSuppression(Rc<dyn NoiseSuppressor>);

impl fmt::Debug for NoiseSuppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NoiseSuppression").finish()
    }
}

impl NoiseSuppression {
    /// Creates a new [`NoiseSuppression`] effect.
    #[inline]
    #[must_use]
    pub fn new(suppressor: Rc<dyn NoiseSuppressor>) -> Self {
        Self(suppressor)
    }
}

#[async_trait(?Send)]
impl TrackEffect for NoiseSuppression {
    #[inline]
    fn kind(&self) -> EffectKind {
        EffectKind::NoiseSuppression
    }

    async fn wrap(&self, raw: &Track) -> Result<Track, Traced<EffectError>> {
        let suppressed = self
            .0
            .suppress(Rc::clone(raw.platform_track()))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        Ok(Track::derived(suppressed, raw, TrackOrigin::NoiseSuppressed))
    }
}
