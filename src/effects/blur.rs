//! Background blur of video tracks.

use std::{cell::Cell, fmt, rc::Rc, sync::Arc, time::Duration};

use async_trait::async_trait;
use local_media_reactive::Task;
use tracerr::Traced;

use crate::{
    conf,
    media::{Track, TrackOrigin},
    platform::{self, FrameSurface, SurfaceFactory},
};

use super::{
    bokeh::{draw_bokeh, BokehParams},
    EffectError, EffectKind, Segmenter, SegmenterCache, TrackEffect,
};

/// Background blur effect.
///
/// Every wrapped track renders into its own [`FrameSurface`] at a fixed
/// cadence, segmenting each frame with the shared [`Segmenter`].
pub struct BackgroundBlur {
    segmenters: Arc<SegmenterCache>,
    surfaces: Rc<dyn SurfaceFactory>,
    params: BokehParams,
    frame_interval: Duration,
}

impl fmt::Debug for BackgroundBlur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundBlur")
            .field("params", &self.params)
            .field("frame_interval", &self.frame_interval)
            .finish()
    }
}

impl BackgroundBlur {
    /// Creates a new [`BackgroundBlur`] effect.
    #[must_use]
    pub fn new(
        segmenters: Arc<SegmenterCache>,
        surfaces: Rc<dyn SurfaceFactory>,
        conf: &conf::Blur,
    ) -> Self {
        Self {
            segmenters,
            surfaces,
            params: BokehParams::from(conf),
            frame_interval: conf.frame_interval,
        }
    }
}

#[async_trait(?Send)]
impl TrackEffect for BackgroundBlur {
    #[inline]
    fn kind(&self) -> EffectKind {
        EffectKind::Blur
    }

    async fn wrap(&self, raw: &Track) -> Result<Track, Traced<EffectError>> {
        let segmenter = self
            .segmenters
            .get()
            .await
            .map_err(tracerr::map_from_and_wrap!())?;

        let source = raw.platform_track();
        let (width, height) = match (source.width(), source.height()) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(tracerr::new!(EffectError::NoFrameSize)),
        };
        let surface = self
            .surfaces
            .create_surface(source, width, height)
            .map_err(tracerr::map_from_and_wrap!())?;

        render_frame(&*segmenter, &*surface, &self.params)
            .await
            .map_err(tracerr::wrap!())?;

        let track = Track::derived(
            surface.capture_track(),
            raw,
            TrackOrigin::Blurred,
        );
        track.attach(FrameLoop::start(
            segmenter,
            surface,
            self.params,
            self.frame_interval,
        ));
        Ok(track)
    }
}

/// Renders the current frame of the `surface`'s source with its background
/// blurred.
async fn render_frame(
    segmenter: &dyn Segmenter,
    surface: &dyn FrameSurface,
    params: &BokehParams,
) -> Result<(), Traced<EffectError>> {
    let frame = surface
        .current_frame()
        .ok_or_else(|| tracerr::new!(EffectError::NoFrame))?;
    let mask = segmenter
        .segment_people(&frame)
        .await
        .map_err(tracerr::map_from_and_wrap!())?;
    surface.render(draw_bokeh(&frame, &mask, params));
    Ok(())
}

/// Running per-frame rendering loop.
///
/// Dropping it stops the loop, cancelling an iteration in progress, and
/// releases the surface.
struct FrameLoop {
    /// Checked by the loop before scheduling the next iteration.
    cancelled: Rc<Cell<bool>>,

    task: Option<Task>,
}

impl FrameLoop {
    fn start(
        segmenter: Arc<dyn Segmenter>,
        surface: Rc<dyn FrameSurface>,
        params: BokehParams,
        interval: Duration,
    ) -> Self {
        let cancelled = Rc::new(Cell::new(false));
        let is_cancelled = Rc::clone(&cancelled);
        let task = Task::spawn(async move {
            loop {
                platform::delay_for(interval).await;
                if is_cancelled.get() {
                    break;
                }
                if let Err(e) =
                    render_frame(&*segmenter, &*surface, &params).await
                {
                    log::warn!("Skipping blurred frame: {}", e);
                }
                if is_cancelled.get() {
                    break;
                }
            }
        });
        Self {
            cancelled,
            task: Some(task),
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancelled.set(true);
        drop(self.task.take());
    }
}
