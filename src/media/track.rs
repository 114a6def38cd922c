//! Media tracks owned by the local media layer.

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use derive_more::Display;
use futures::{
    future::{self, Either, LocalBoxFuture},
    stream::LocalBoxStream,
    StreamExt as _,
};
use local_media_reactive::{ObservableCell, Task};

use crate::platform::{self, MediaStreamTrackState};

use super::{MediaKind, MediaSourceKind};

/// Where the media of a [`Track`] comes from.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum TrackOrigin {
    /// Camera or microphone capture.
    Device,

    /// Screen capture.
    Display,

    /// Synthetic silence or blank picture.
    Placeholder,

    /// Device video with blurred background.
    Blurred,

    /// Device audio with suppressed noise.
    NoiseSuppressed,
}

/// Why a [`Track`] has ended.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum EndReason {
    /// Stopped by its owner.
    Stopped,

    /// Ended by the platform or the upstream [`Track`].
    Ended,
}

/// Lifecycle state of a [`Track`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackState {
    /// Media is flowing.
    Live,

    /// Terminal state.
    Ended(EndReason),
}

impl TrackState {
    /// Indicates whether this is the [`TrackState::Ended`] state.
    #[inline]
    #[must_use]
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended(_))
    }
}

/// Actual data of a [`Track`].
struct Inner {
    /// Underlying platform track.
    track: Rc<dyn platform::MediaStreamTrack>,

    origin: TrackOrigin,

    state: ObservableCell<TrackState>,

    /// Resources bound to this [`Track`] being live, released once it ends.
    resources: RefCell<Vec<Box<dyn Any>>>,

    /// Watches the platform track and the `parent` ending.
    watcher: RefCell<Option<Task>>,

    /// Upstream [`Track`] this one is derived from.
    parent: Option<Track>,
}

impl Inner {
    /// Moves this [`Inner`] into the [`TrackState::Ended`] state, releasing
    /// its resources and the platform track.
    fn end(&self, reason: EndReason) {
        if self.state.get().is_ended() {
            return;
        }
        let resources = self.resources.take();
        drop(resources);
        self.track.stop();
        self.state.set(TrackState::Ended(reason));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.end(EndReason::Stopped);
    }
}

/// Handle to one media stream.
///
/// Cloning a [`Track`] creates another handle to the same stream, two
/// [`Track`]s are equal only if they are handles to the same stream.
///
/// The stream is stopped once [`Track::stop()`] is called or the last handle
/// is dropped. Consumers must expect a [`Track`] to end at any time, and
/// watch [`Track::on_ended()`] for that.
#[derive(Clone)]
pub struct Track(Rc<Inner>);

impl Track {
    /// Wraps the provided platform `track`.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[must_use]
    pub fn new(
        track: Rc<dyn platform::MediaStreamTrack>,
        origin: TrackOrigin,
    ) -> Self {
        Self::build(track, origin, None)
    }

    /// Wraps the provided platform `track` produced out of the `parent`
    /// [`Track`]. The created [`Track`] ends once the `parent` ends.
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    #[must_use]
    pub fn derived(
        track: Rc<dyn platform::MediaStreamTrack>,
        parent: &Track,
        origin: TrackOrigin,
    ) -> Self {
        Self::build(track, origin, Some(parent.clone()))
    }

    fn build(
        track: Rc<dyn platform::MediaStreamTrack>,
        origin: TrackOrigin,
        parent: Option<Track>,
    ) -> Self {
        let initial = match track.ready_state() {
            MediaStreamTrackState::Live => TrackState::Live,
            MediaStreamTrackState::Ended => {
                TrackState::Ended(EndReason::Ended)
            }
        };
        let platform_ended = track.on_ended();
        let parent_ended = parent.as_ref().map(Track::on_ended);
        let inner = Rc::new(Inner {
            track,
            origin,
            state: ObservableCell::new(initial),
            resources: RefCell::new(Vec::new()),
            watcher: RefCell::new(None),
            parent,
        });
        if initial.is_ended() {
            return Self(inner);
        }

        let weak = Rc::downgrade(&inner);
        let watcher = Task::spawn(async move {
            let reason = match parent_ended {
                Some(parent_ended) => {
                    match future::select(platform_ended, parent_ended).await {
                        Either::Left(_) => EndReason::Ended,
                        Either::Right((reason, _)) => reason,
                    }
                }
                None => {
                    platform_ended.await;
                    EndReason::Ended
                }
            };
            if let Some(inner) = weak.upgrade() {
                log::debug!(
                    "{} track {} ended: {}",
                    inner.track.kind(),
                    inner.track.id(),
                    reason,
                );
                inner.end(reason);
            }
        });
        *inner.watcher.borrow_mut() = Some(watcher);

        Self(inner)
    }

    /// Returns ID of the underlying platform track.
    #[inline]
    #[must_use]
    pub fn id(&self) -> String {
        self.0.track.id()
    }

    /// Returns [`MediaKind`] of this [`Track`].
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.0.track.kind()
    }

    /// Returns [`TrackOrigin`] of this [`Track`].
    #[inline]
    #[must_use]
    pub fn origin(&self) -> TrackOrigin {
        self.0.origin
    }

    /// Returns [`MediaSourceKind`] of this [`Track`].
    #[must_use]
    pub fn source_kind(&self) -> MediaSourceKind {
        match self.0.origin {
            TrackOrigin::Display => MediaSourceKind::Display,
            TrackOrigin::Device
            | TrackOrigin::Placeholder
            | TrackOrigin::Blurred
            | TrackOrigin::NoiseSuppressed => MediaSourceKind::Device,
        }
    }

    /// Indicates whether this [`Track`] is a synthetic placeholder.
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.origin == TrackOrigin::Placeholder
    }

    /// Returns ID of the device this [`Track`] captures, looking through
    /// derived [`Track`]s up to the capturing one.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        match &self.0.parent {
            Some(parent) => parent.device_id(),
            None => self.0.track.device_id(),
        }
    }

    /// Returns the [`Track`] this one is derived from, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Track> {
        self.0.parent.as_ref()
    }

    /// Returns the underlying platform track.
    #[inline]
    #[must_use]
    pub fn platform_track(&self) -> &Rc<dyn platform::MediaStreamTrack> {
        &self.0.track
    }

    /// Returns current [`TrackState`].
    #[inline]
    #[must_use]
    pub fn state(&self) -> TrackState {
        self.0.state.get()
    }

    /// Indicates whether this [`Track`] is [`TrackState::Live`].
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Returns a [`Stream`] of [`TrackState`] changes, starting with the
    /// current one.
    ///
    /// [`Stream`]: futures::Stream
    #[inline]
    pub fn on_state_change(&self) -> LocalBoxStream<'static, TrackState> {
        self.0.state.subscribe()
    }

    /// Returns a [`Future`] resolving with the [`EndReason`] once this
    /// [`Track`] ends.
    ///
    /// [`Future`]: std::future::Future
    pub fn on_ended(&self) -> LocalBoxFuture<'static, EndReason> {
        let mut states = self.0.state.subscribe();
        Box::pin(async move {
            while let Some(state) = states.next().await {
                if let TrackState::Ended(reason) = state {
                    return reason;
                }
            }
            EndReason::Stopped
        })
    }

    /// Stops this [`Track`], releasing its media source and everything bound
    /// to it. Does nothing if it has already ended.
    ///
    /// Stopping a derived [`Track`] never stops its parent.
    #[inline]
    pub fn stop(&self) {
        self.0.end(EndReason::Stopped);
    }

    /// Binds the provided `resource` to this [`Track`] being live. The
    /// `resource` is dropped once this [`Track`] ends.
    pub(crate) fn attach<R: 'static>(&self, resource: R) {
        if self.state().is_ended() {
            drop(resource);
        } else {
            self.0.resources.borrow_mut().push(Box::new(resource));
        }
    }
}

impl PartialEq for Track {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Track {}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.0.track.id())
            .field("kind", &self.0.track.kind())
            .field("origin", &self.0.origin)
            .field("state", &self.0.state.get())
            .finish()
    }
}

/// Stops the wrapped [`Track`] once dropped.
#[derive(Debug)]
pub(crate) struct StopOnDrop(pub(crate) Track);

impl Drop for StopOnDrop {
    #[inline]
    fn drop(&mut self) {
        self.0.stop();
    }
}
