//! User-initiated screen capture.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use futures::{
    channel::oneshot,
    future::{self, Either},
    pin_mut,
    stream::LocalBoxStream,
    StreamExt as _,
};
use local_media_reactive::{ObservableCell, Publisher, Shared, Subscription};
use smart_default::SmartDefault;
use tracerr::Traced;

use crate::platform::{self, ContentHint, MediaDevices};

use super::{track::StopOnDrop, Track, TrackOrigin};

/// Options of a screen capture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, SmartDefault)]
pub struct ScreenShareOptions {
    /// [`ContentHint`] set on the captured track.
    #[default(ContentHint::Text)]
    pub content_hint: ContentHint,
}

/// Everything the output producer of a [`ScreenShare`] works with.
struct Ctx {
    enabled: ObservableCell<bool>,
    options: Cell<ScreenShareOptions>,
    media_devices: Rc<dyn MediaDevices>,

    /// Keeps the output active while a share started by
    /// [`ScreenShare::start()`] is running.
    hold: RefCell<Option<Subscription<Option<Track>>>>,
}

impl Ctx {
    /// Drives the output while sharing is enabled, returning once it's
    /// disabled.
    ///
    /// Sharing is never retried: a failed or cancelled capture disables it.
    /// A capture ended through the system UI disables it and releases the
    /// output held by [`ScreenShare::start()`].
    async fn run_enabled(&self, publisher: &Publisher<Option<Track>>) {
        let acquired = self.acquire();
        let disabled = self.enabled.when_eq(false);
        let track = match future::select(acquired, disabled).await {
            Either::Left((Ok(Ok(track)), _)) => track,
            Either::Left((Ok(Err(e)), _)) => {
                log::info!("Screen share was not started: {}", e);
                self.enabled.set(false);
                return;
            }
            Either::Left((Err(oneshot::Canceled), _)) => {
                log::error!("Screen capture task was dropped");
                self.enabled.set(false);
                return;
            }
            Either::Right(_) => return,
        };
        let track = StopOnDrop(track);
        if !self.enabled.get() {
            return;
        }
        let _ = publisher.publish(Some(track.0.clone()));

        let ended = track.0.on_ended();
        let disabled = self.enabled.when_eq(false);
        if let Either::Left((reason, _)) =
            future::select(ended, disabled).await
        {
            log::info!(
                "Screen share track {} ended: {}",
                track.0.id(),
                reason,
            );
            self.enabled.set(false);
            self.release_hold();
        }
    }

    /// Drops the [`Subscription`] held by [`ScreenShare::start()`], if any.
    fn release_hold(&self) {
        let hold = self.hold.borrow_mut().take();
        drop(hold);
    }

    /// Spawns a detached screen capture, returning a receiver of its result.
    ///
    /// A capture resolved after the receiver is dropped is stopped right
    /// away.
    fn acquire(
        &self,
    ) -> oneshot::Receiver<Result<Track, Traced<platform::Error>>> {
        let (tx, rx) = oneshot::channel();
        let media_devices = Rc::clone(&self.media_devices);
        let hint = self.options.get().content_hint;
        platform::spawn(async move {
            let result =
                media_devices.get_display_media().await.map(|track| {
                    track.set_content_hint(hint);
                    Track::new(track, TrackOrigin::Display)
                });
            if let Err(Ok(track)) = tx.send(result) {
                track.stop();
            }
        });
        rx
    }
}

/// Screen capture started and stopped on the user's demand, and stopped
/// through the system UI as well.
///
/// Its output is the captured [`Track`] while sharing, or [`None`].
pub struct ScreenShare {
    ctx: Rc<Ctx>,
    output: Shared<Option<Track>>,
}

impl fmt::Debug for ScreenShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenShare")
            .field("enabled", &self.ctx.enabled.get())
            .field("options", &self.ctx.options.get())
            .finish()
    }
}

impl ScreenShare {
    /// Creates a new inactive [`ScreenShare`].
    #[must_use]
    pub fn new(
        media_devices: Rc<dyn MediaDevices>,
        options: ScreenShareOptions,
    ) -> Self {
        let ctx = Rc::new(Ctx {
            enabled: ObservableCell::new(false),
            options: Cell::new(options),
            media_devices,
            hold: RefCell::new(None),
        });

        let producer_ctx = Rc::clone(&ctx);
        let output = Shared::new(move |publisher: Publisher<Option<Track>>| {
            let ctx = Rc::clone(&producer_ctx);
            let mut enabled = ctx.enabled.subscribe();
            async move {
                while let Some(on) = enabled.next().await {
                    if on {
                        ctx.run_enabled(&publisher).await;
                    }
                    let _ = publisher.publish(None);
                }
            }
        });

        Self { ctx, output }
    }

    /// Starts sharing a screen with the provided `options`, returning the
    /// captured [`Track`].
    ///
    /// Returns [`None`] if the user denied or cancelled the capture. The
    /// already running share is returned if there is one.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    pub async fn start(&self, options: ScreenShareOptions) -> Option<Track> {
        self.ctx.options.set(options);
        let mut sub = self.output.subscribe();
        self.ctx.enabled.set(true);
        let disabled = self.ctx.enabled.when_eq(false);

        let track = {
            let live = async {
                while let Some(track) = sub.next().await {
                    if track.is_some() {
                        return track;
                    }
                }
                None
            };
            pin_mut!(live);
            match future::select(live, disabled).await {
                Either::Left((track, _)) => track,
                Either::Right(_) => None,
            }
        };
        if track.is_some() && self.ctx.enabled.get() {
            *self.ctx.hold.borrow_mut() = Some(sub);
        }
        track
    }

    /// Stops sharing the screen.
    pub fn stop(&self) {
        self.ctx.enabled.set(false);
        self.ctx.release_hold();
    }

    /// Subscribes to the captured [`Track`].
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub fn subscribe(&self) -> Subscription<Option<Track>> {
        self.output.subscribe()
    }

    /// Returns the output of this [`ScreenShare`].
    #[inline]
    #[must_use]
    pub fn output(&self) -> &Shared<Option<Track>> {
        &self.output
    }

    /// Returns the currently captured [`Track`], if any.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<Track> {
        self.output.current().flatten()
    }

    /// Indicates whether sharing is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.ctx.enabled.get()
    }

    /// Returns a [`Stream`] of enabled flag changes, starting with the
    /// current value.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_enabled_change(&self) -> LocalBoxStream<'static, bool> {
        self.ctx.enabled.subscribe()
    }
}

impl Drop for ScreenShare {
    fn drop(&mut self) {
        self.ctx.release_hold();
    }
}
