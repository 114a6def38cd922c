//! Observable analogue of a [`Cell`].
//!
//! [`Cell`]: std::cell::Cell

use std::{
    cell::{Ref, RefCell},
    fmt,
};

use futures::{
    channel::{mpsc, oneshot},
    future::{self, LocalBoxFuture},
    stream::{self, LocalBoxStream, StreamExt as _},
};

/// Error that is resolved into all pending [`ObservableCell::when`] futures
/// when the [`ObservableCell`] is dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DroppedError;

impl fmt::Display for DroppedError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observable value has been dropped")
    }
}

impl From<oneshot::Canceled> for DroppedError {
    #[inline]
    fn from(_: oneshot::Canceled) -> Self {
        Self
    }
}

/// Single subscriber of an [`ObservableCell`].
enum Subscriber<D> {
    /// Receives every modification.
    Stream(mpsc::UnboundedSender<D>),

    /// Resolves once `assert_fn` returns `true` for a new value.
    When {
        /// Resolves [`ObservableCell::when`] future.
        sender: oneshot::Sender<()>,

        /// Predicate checked on every modification.
        assert_fn: Box<dyn Fn(&D) -> bool>,
    },
}

/// Interior-mutable container which emits all its modifications to its
/// subscribers.
///
/// A modification is emitted only if the new value differs from the old one
/// (according to its [`PartialEq`] implementation).
///
/// ```
/// use local_media_reactive::ObservableCell;
///
/// let flag = ObservableCell::new(0i32);
/// flag.set(100);
/// assert_eq!(flag.get(), 100);
///
/// let old = flag.replace(200);
/// assert_eq!(old, 100);
///
/// flag.mutate(|v| *v += 1);
/// assert_eq!(flag.get(), 201);
/// ```
pub struct ObservableCell<D> {
    /// Stored value.
    data: RefCell<D>,

    /// Subscribers of this [`ObservableCell`] modifications.
    subs: RefCell<Vec<Subscriber<D>>>,
}

impl<D> fmt::Debug for ObservableCell<D>
where
    D: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("data", &self.data)
            .field("subs", &self.subs.borrow().len())
            .finish()
    }
}

impl<D: 'static> ObservableCell<D> {
    /// Creates a new [`ObservableCell`] holding the provided `data`.
    #[inline]
    pub fn new(data: D) -> Self {
        Self {
            data: RefCell::new(data),
            subs: RefCell::new(Vec::new()),
        }
    }

    /// Returns an immutable reference to the stored value.
    #[inline]
    pub fn borrow(&self) -> Ref<'_, D> {
        self.data.borrow()
    }

    /// Returns a [`Future`] resolving once the stored value satisfies the
    /// provided `assert_fn`. Resolves immediately if it already does.
    ///
    /// [`Future`]: std::future::Future
    pub fn when<F>(
        &self,
        assert_fn: F,
    ) -> LocalBoxFuture<'static, Result<(), DroppedError>>
    where
        F: Fn(&D) -> bool + 'static,
    {
        if (assert_fn)(&self.data.borrow()) {
            return Box::pin(future::ok(()));
        }
        let (sender, rx) = oneshot::channel();
        self.subs.borrow_mut().push(Subscriber::When {
            sender,
            assert_fn: Box::new(assert_fn),
        });
        Box::pin(async move { Ok(rx.await?) })
    }
}

impl<D: PartialEq + 'static> ObservableCell<D> {
    /// Returns a [`Future`] resolving once the stored value becomes equal to
    /// the provided `should_be` one.
    ///
    /// [`Future`]: std::future::Future
    #[inline]
    pub fn when_eq(
        &self,
        should_be: D,
    ) -> LocalBoxFuture<'static, Result<(), DroppedError>> {
        self.when(move |data| data == &should_be)
    }
}

impl<D: Clone + 'static> ObservableCell<D> {
    /// Returns a copy of the stored value.
    #[inline]
    pub fn get(&self) -> D {
        self.data.borrow().clone()
    }

    /// Returns a [`Stream`] of this [`ObservableCell`] values. The current
    /// value is yielded first, then every modification.
    ///
    /// The [`Stream`] ends once this [`ObservableCell`] is dropped.
    ///
    /// [`Stream`]: futures::Stream
    pub fn subscribe(&self) -> LocalBoxStream<'static, D> {
        let current = self.get();
        let (tx, rx) = mpsc::unbounded();
        self.subs.borrow_mut().push(Subscriber::Stream(tx));
        Box::pin(stream::once(async move { current }).chain(rx))
    }
}

impl<D: Clone + PartialEq + 'static> ObservableCell<D> {
    /// Replaces the stored value with the provided one, returning the old
    /// value. Subscribers are notified if the value has changed.
    pub fn replace(&self, new: D) -> D {
        let old = self.data.replace(new.clone());
        if old != new {
            self.notify_modified(&new);
        }
        old
    }

    /// Sets the stored value. Subscribers are notified if the value has
    /// changed.
    #[inline]
    pub fn set(&self, new: D) {
        drop(self.replace(new));
    }

    /// Mutates the stored value with the provided function. Subscribers are
    /// notified if the value has changed.
    pub fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut D),
    {
        let (before, after) = {
            let mut data = self.data.borrow_mut();
            let before = data.clone();
            f(&mut data);
            (before, data.clone())
        };
        if before != after {
            self.notify_modified(&after);
        }
    }

    /// Fires all matching [`ObservableCell::when`] subscribers and pushes the
    /// new value to all [`ObservableCell::subscribe`] streams.
    fn notify_modified(&self, data: &D) {
        let fired: Vec<_> = {
            let mut subs = self.subs.borrow_mut();
            let mut fired = Vec::new();
            let mut kept = Vec::with_capacity(subs.len());
            for sub in subs.drain(..) {
                match sub {
                    Subscriber::Stream(tx) => {
                        if tx.unbounded_send(data.clone()).is_ok() {
                            kept.push(Subscriber::Stream(tx));
                        }
                    }
                    Subscriber::When { sender, assert_fn } => {
                        if (assert_fn)(data) {
                            fired.push(sender);
                        } else {
                            kept.push(Subscriber::When { sender, assert_fn });
                        }
                    }
                }
            }
            *subs = kept;
            fired
        };
        for sender in fired {
            let _ = sender.send(());
        }
    }
}
