//! On/off control over a [`DeviceTrackSource`].

use std::{cell::RefCell, rc::Rc, time::Duration};

use derive_more::Display;
use futures::{
    channel::oneshot,
    future::{self, Either},
    stream::LocalBoxStream,
    StreamExt as _,
};
use local_media_reactive::{ObservableCell, Publisher, Shared, Subscription};
use tokio::time::Instant;
use tracerr::Traced;

use crate::platform::{self, MediaDevices};

use super::{
    track::StopOnDrop, AcquireError, DeviceTrackSource, MediaKind, Track,
    TrackOrigin, UnavailabilityReason,
};

/// State of a [`TrackGate`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum GateState {
    /// Disabled, or nobody observes the output. Placeholder is yielded.
    Off,

    /// Device track is being acquired. Placeholder is yielded.
    Acquiring,

    /// Live device track is yielded.
    On,

    /// Acquisition has failed, the gate is turning off.
    #[display(fmt = "Error({})", _0)]
    Error(UnavailabilityReason),
}

/// Device [`Track`] ending sooner than this after being acquired is
/// considered failed.
const MIN_LIFETIME: Duration = Duration::from_millis(500);

/// Number of device [`Track`]s in a row failing within [`MIN_LIFETIME`] after
/// which a [`TrackGate`] gives up.
const MAX_SHORT_LIVED: u32 = 3;

/// Everything the output producer of a [`TrackGate`] works with.
struct Ctx {
    kind: MediaKind,
    enabled: ObservableCell<bool>,
    state: ObservableCell<GateState>,
    reason: ObservableCell<Option<UnavailabilityReason>>,
    source: Rc<DeviceTrackSource>,
    media_devices: Rc<dyn MediaDevices>,

    /// Cached placeholder [`Track`].
    placeholder: RefCell<Option<Track>>,
}

impl Ctx {
    /// Returns the placeholder [`Track`], creating it if there is no live
    /// one.
    fn placeholder(&self) -> Track {
        let mut cached = self.placeholder.borrow_mut();
        if let Some(track) = cached.as_ref().filter(|t| t.is_live()) {
            return track.clone();
        }
        let track = Track::new(
            self.media_devices.placeholder_track(self.kind),
            TrackOrigin::Placeholder,
        );
        *cached = Some(track.clone());
        track
    }

    /// Drives the output while the gate is enabled, returning once it's
    /// disabled.
    ///
    /// Gives up with [`UnavailabilityReason::DevicesExhausted`] once
    /// [`MAX_SHORT_LIVED`] acquired [`Track`]s in a row end within
    /// [`MIN_LIFETIME`].
    async fn run_enabled(&self, publisher: &Publisher<Track>) {
        let mut short_lived = 0;
        loop {
            self.state.set(GateState::Acquiring);
            let _ = publisher.publish(self.placeholder());

            let acquired = self.acquire();
            let disabled = self.enabled.when_eq(false);
            let track = match future::select(acquired, disabled).await {
                Either::Left((Ok(Ok(track)), _)) => track,
                Either::Left((Ok(Err(e)), _)) => {
                    self.fail(e.as_ref().reason(), &e);
                    return;
                }
                Either::Left((Err(oneshot::Canceled), _)) => {
                    self.fail(
                        UnavailabilityReason::Unknown,
                        &"acquisition task was dropped",
                    );
                    return;
                }
                // Pending acquisition is disposed of once it resolves.
                Either::Right(_) => return,
            };
            let track = StopOnDrop(track);
            if !self.enabled.get() {
                return;
            }

            self.reason.set(None);
            self.state.set(GateState::On);
            let _ = publisher.publish(track.0.clone());
            let acquired_at = Instant::now();

            let ended = track.0.on_ended();
            let disabled = self.enabled.when_eq(false);
            if let Either::Right(_) = future::select(ended, disabled).await {
                return;
            }
            if acquired_at.elapsed() < MIN_LIFETIME {
                short_lived += 1;
            } else {
                short_lived = 0;
            }
            if short_lived >= MAX_SHORT_LIVED {
                self.fail(
                    UnavailabilityReason::DevicesExhausted,
                    &format_args!(
                        "{} device tracks ended right after acquisition",
                        short_lived,
                    ),
                );
                return;
            }
            log::warn!(
                "{} device track {} ended, reacquiring",
                self.kind,
                track.0.id(),
            );
        }
    }

    /// Spawns a detached acquisition, returning a receiver of its result.
    ///
    /// If the receiver is dropped the acquisition stops before its next
    /// attempt, and an acquired [`Track`] is stopped right away.
    fn acquire(
        &self,
    ) -> oneshot::Receiver<Result<Track, Traced<AcquireError>>> {
        let (tx, rx) = oneshot::channel();
        let source = Rc::clone(&self.source);
        platform::spawn(async move {
            let result = {
                let is_cancelled = || tx.is_canceled();
                source.acquire(&is_cancelled).await
            };
            if let Err(Ok(track)) = tx.send(result) {
                log::debug!(
                    "Disposing {} track {} acquired after being disabled",
                    track.kind(),
                    track.id(),
                );
                track.stop();
            }
        });
        rx
    }

    /// Records the failed acquisition and disables the gate.
    fn fail<E: std::fmt::Display + ?Sized>(
        &self,
        reason: UnavailabilityReason,
        err: &E,
    ) {
        if reason == UnavailabilityReason::Unknown {
            log::error!("Failed to acquire {} track: {}", self.kind, err);
        } else {
            log::warn!("Failed to acquire {} track: {}", self.kind, err);
        }
        self.state.set(GateState::Error(reason));
        self.reason.set(Some(reason));
        self.enabled.set(false);
    }
}

/// Resets the [`GateState`] once an output activation is over.
struct ResetOnDrop(Rc<Ctx>);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.state.set(GateState::Off);
    }
}

/// Gate switching a [`DeviceTrackSource`] on and off.
///
/// Its output always has a [`Track`]: the live device [`Track`] while
/// [`GateState::On`], or a placeholder one otherwise. A device is acquired
/// only while the gate is enabled and its output is observed.
pub struct TrackGate {
    ctx: Rc<Ctx>,
    output: Shared<Track>,
}

impl std::fmt::Debug for TrackGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackGate")
            .field("kind", &self.ctx.kind)
            .field("enabled", &self.ctx.enabled.get())
            .field("state", &self.ctx.state.get())
            .finish()
    }
}

impl TrackGate {
    /// Creates a new disabled [`TrackGate`] over the provided `source`.
    #[must_use]
    pub fn new(
        source: Rc<DeviceTrackSource>,
        media_devices: Rc<dyn MediaDevices>,
    ) -> Self {
        let ctx = Rc::new(Ctx {
            kind: source.kind(),
            enabled: ObservableCell::new(false),
            state: ObservableCell::new(GateState::Off),
            reason: ObservableCell::new(None),
            source,
            media_devices,
            placeholder: RefCell::new(None),
        });

        let producer_ctx = Rc::clone(&ctx);
        let output = Shared::new(move |publisher: Publisher<Track>| {
            let ctx = Rc::clone(&producer_ctx);
            let mut enabled = ctx.enabled.subscribe();
            async move {
                let _reset = ResetOnDrop(Rc::clone(&ctx));
                while let Some(on) = enabled.next().await {
                    if on {
                        ctx.run_enabled(&publisher).await;
                    } else {
                        ctx.state.set(GateState::Off);
                        let _ = publisher.publish(ctx.placeholder());
                    }
                }
            }
        });

        Self { ctx, output }
    }

    /// Returns [`MediaKind`] of this [`TrackGate`].
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.ctx.kind
    }

    /// Subscribes to the output [`Track`] of this [`TrackGate`].
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[inline]
    pub fn subscribe(&self) -> Subscription<Track> {
        self.output.subscribe()
    }

    /// Returns the output of this [`TrackGate`].
    #[inline]
    #[must_use]
    pub fn output(&self) -> &Shared<Track> {
        &self.output
    }

    /// Enables or disables this [`TrackGate`].
    #[inline]
    pub fn set_enabled(&self, enabled: bool) {
        self.ctx.enabled.set(enabled);
    }

    /// Indicates whether this [`TrackGate`] is enabled.
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

    /// Returns current [`GateState`].
    #[inline]
    #[must_use]
    pub fn state(&self) -> GateState {
        self.ctx.state.get()
    }

    /// Returns a [`Stream`] of [`GateState`] changes, starting with the
    /// current one.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_state_change(&self) -> LocalBoxStream<'static, GateState> {
        self.ctx.state.subscribe()
    }

    /// Returns the [`UnavailabilityReason`] of the last failed acquisition,
    /// unless a later one has succeeded.
    #[inline]
    #[must_use]
    pub fn unavailability_reason(&self) -> Option<UnavailabilityReason> {
        self.ctx.reason.get()
    }

    /// Returns a [`Stream`] of [`UnavailabilityReason`] changes, starting
    /// with the current one.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_unavailability_reason_change(
        &self,
    ) -> LocalBoxStream<'static, Option<UnavailabilityReason>> {
        self.ctx.reason.subscribe()
    }
}
