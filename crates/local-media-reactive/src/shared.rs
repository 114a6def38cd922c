//! Lazily computed values shared between any number of observers.

use std::{
    cell::RefCell,
    fmt,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll},
};

use futures::{
    channel::mpsc,
    future::{FutureExt as _, LocalBoxFuture},
    Stream,
};

use crate::task::Task;

/// Function starting a producer of a [`Shared`] value.
type Producer<T> = Box<dyn Fn(Publisher<T>) -> LocalBoxFuture<'static, ()>>;

/// Mutable state of a [`Shared`] value.
struct State<T> {
    /// Number of alive [`Subscription`]s.
    observers: usize,

    /// Incremented on every producer start, so stale [`Publisher`]s of
    /// previous activations are ignored.
    generation: u64,

    /// Last published value.
    value: Option<T>,

    /// Senders of all alive [`Subscription`]s.
    subs: Vec<mpsc::UnboundedSender<T>>,

    /// Running producer. [`Some`] while `observers > 0`.
    task: Option<Task>,
}

/// Actual data of a [`Shared`] value.
struct Inner<T> {
    /// Starts a new producer.
    producer: Producer<T>,

    /// Mutable state.
    state: RefCell<State<T>>,
}

/// Ref-counted derived value.
///
/// The value is produced by a producer [`Future`] which runs only while at
/// least one [`Subscription`] is alive:
/// - the first [`Shared::subscribe()`] call starts the producer;
/// - the producer publishes values with its [`Publisher`], every
///   [`Subscription`] observes the latest published value followed by all
///   subsequent ones;
/// - dropping the last [`Subscription`] drops the producer [`Future`] and the
///   last published value before [`Drop::drop`] returns, so all resources
///   owned by them are released deterministically;
/// - the next [`Shared::subscribe()`] call starts a fresh producer.
///
/// Cloning a [`Shared`] creates another handle to the same value.
pub struct Shared<T>(Rc<Inner<T>>);

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Shared<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Shared")
            .field("observers", &state.observers)
            .field("generation", &state.generation)
            .field("value", &state.value)
            .finish()
    }
}

impl<T> Shared<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Creates a new [`Shared`] value computed by the provided `producer`.
    ///
    /// Nothing is started until the first [`Shared::subscribe()`] call.
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn(Publisher<T>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self(Rc::new(Inner {
            producer: Box::new(move |publisher: Publisher<T>| {
                producer(publisher).boxed_local()
            }),
            state: RefCell::new(State {
                observers: 0,
                generation: 0,
                value: None,
                subs: Vec::new(),
                task: None,
            }),
        }))
    }

    /// Subscribes to this [`Shared`] value, starting its producer if this is
    /// the first alive [`Subscription`].
    ///
    /// # Panics
    ///
    /// If the producer has to be started outside of a
    /// [`LocalSet`](tokio::task::LocalSet) context.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded();
        let start = {
            let mut state = self.0.state.borrow_mut();
            state.observers += 1;
            if let Some(value) = &state.value {
                let _ = tx.unbounded_send(value.clone());
            }
            state.subs.push(tx);
            if state.observers == 1 {
                state.generation += 1;
                Some(state.generation)
            } else {
                None
            }
        };

        if let Some(generation) = start {
            let publisher = Publisher {
                inner: Rc::downgrade(&self.0),
                generation,
            };
            let task = Task::spawn((self.0.producer)(publisher));
            self.0.state.borrow_mut().task = Some(task);
        }

        Subscription {
            shared: self.clone(),
            rx,
        }
    }

    /// Returns the latest published value, if this [`Shared`] is active and
    /// has published anything yet.
    #[inline]
    pub fn current(&self) -> Option<T> {
        self.0.state.borrow().value.clone()
    }

    /// Returns the number of alive [`Subscription`]s.
    #[inline]
    pub fn observers(&self) -> usize {
        self.0.state.borrow().observers
    }

    /// Indicates whether the producer of this [`Shared`] value is running.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.0.state.borrow().task.is_some()
    }

    /// Returns how many times the producer has been started.
    #[inline]
    pub fn activations(&self) -> u64 {
        self.0.state.borrow().generation
    }
}

impl<T> Shared<T> {
    /// Releases one observer, tearing the producer down if it was the last
    /// one.
    fn release(&self) {
        let (task, value, subs) = {
            let mut state = self.0.state.borrow_mut();
            state.observers -= 1;
            if state.observers > 0 {
                return;
            }
            (
                state.task.take(),
                state.value.take(),
                std::mem::take(&mut state.subs),
            )
        };
        // Dropped outside of the borrow, as dropping them may release other
        // values.
        drop(task);
        drop(value);
        drop(subs);
    }
}

/// Handle publishing values of a [`Shared`] from its producer.
pub struct Publisher<T> {
    /// [`Shared`] value being produced.
    inner: Weak<Inner<T>>,

    /// Activation this [`Publisher`] belongs to.
    generation: u64,
}

impl<T> Clone for Publisher<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            generation: self.generation,
        }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> Publisher<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Publishes the provided `value` to all [`Subscription`]s.
    ///
    /// Returns `false` if nothing was published: the value is equal to the
    /// latest published one, or this [`Publisher`]'s activation is over.
    pub fn publish(&self, value: T) -> bool {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return false,
        };
        let old = {
            let mut state = inner.state.borrow_mut();
            if state.generation != self.generation || state.observers == 0 {
                return false;
            }
            if state.value.as_ref() == Some(&value) {
                return false;
            }
            state
                .subs
                .retain(|tx| tx.unbounded_send(value.clone()).is_ok());
            state.value.replace(value)
        };
        drop(old);
        true
    }

    /// Returns the latest value published in this activation.
    pub fn current(&self) -> Option<T> {
        let inner = self.inner.upgrade()?;
        let state = inner.state.borrow();
        if state.generation == self.generation {
            state.value.clone()
        } else {
            None
        }
    }
}

/// Observer of a [`Shared`] value.
///
/// Yields the latest value published before subscription (if any) and then
/// every new one. Dropping it releases the [`Shared`] value.
pub struct Subscription<T> {
    /// Observed value.
    shared: Shared<T>,

    /// Receiver of published values.
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

impl<T> Subscription<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Returns the latest published value of the observed [`Shared`].
    #[inline]
    pub fn current(&self) -> Option<T> {
        self.shared.current()
    }

    /// Returns the observed [`Shared`] value.
    #[inline]
    pub fn shared(&self) -> &Shared<T> {
        &self.shared
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    #[inline]
    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl<T> Drop for Subscription<T> {
    #[inline]
    fn drop(&mut self) {
        self.shared.release();
    }
}

#[cfg(test)]
mod spec {
    use std::{cell::Cell, rc::Rc};

    use futures::{future, StreamExt as _};
    use tokio::task::{self, LocalSet};

    use crate::ObservableCell;

    use super::Shared;

    /// Counts its instances which are still alive.
    #[derive(Debug)]
    struct Resource(Rc<Cell<usize>>);

    impl Resource {
        fn new(alive: &Rc<Cell<usize>>) -> Self {
            alive.set(alive.get() + 1);
            Self(Rc::clone(alive))
        }
    }

    impl Drop for Resource {
        fn drop(&mut self) {
            self.0.set(self.0.get() - 1);
        }
    }

    #[tokio::test]
    async fn producer_starts_once_for_many_observers() {
        LocalSet::new()
            .run_until(async {
                let starts = Rc::new(Cell::new(0));
                let counter = Rc::clone(&starts);
                let shared = Shared::new(move |publisher| {
                    counter.set(counter.get() + 1);
                    async move {
                        let _ = publisher.publish(1u8);
                        future::pending::<()>().await;
                    }
                });

                let mut first = shared.subscribe();
                let mut second = shared.subscribe();
                assert_eq!(first.next().await, Some(1));
                assert_eq!(second.next().await, Some(1));
                assert_eq!(starts.get(), 1);
                assert_eq!(shared.observers(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn late_observer_gets_latest_value() {
        LocalSet::new()
            .run_until(async {
                let shared = Shared::new(|publisher| async move {
                    let _ = publisher.publish(1u8);
                    let _ = publisher.publish(2u8);
                    future::pending::<()>().await;
                });
                let mut first = shared.subscribe();
                assert_eq!(first.next().await, Some(1));
                assert_eq!(first.next().await, Some(2));

                let mut late = shared.subscribe();
                assert_eq!(late.next().await, Some(2));
            })
            .await;
    }

    #[tokio::test]
    async fn last_release_tears_down_synchronously() {
        LocalSet::new()
            .run_until(async {
                let alive = Rc::new(Cell::new(0));
                let alive_in_producer = Rc::clone(&alive);
                let shared = Shared::new(move |publisher| {
                    let alive = Rc::clone(&alive_in_producer);
                    async move {
                        let _held = Resource::new(&alive);
                        let _ = publisher.publish(());
                        future::pending::<()>().await;
                    }
                });

                let mut first = shared.subscribe();
                let second = shared.subscribe();
                first.next().await.unwrap();
                assert_eq!(alive.get(), 1);

                drop(first);
                assert_eq!(alive.get(), 1);
                assert!(shared.is_active());

                drop(second);
                assert_eq!(alive.get(), 0);
                assert!(!shared.is_active());
                assert_eq!(shared.current(), None);
            })
            .await;
    }

    #[tokio::test]
    async fn resubscribe_restarts_producer() {
        LocalSet::new()
            .run_until(async {
                let shared = Shared::new(|publisher| async move {
                    let _ = publisher.publish(7u8);
                    future::pending::<()>().await;
                });
                let mut sub = shared.subscribe();
                assert_eq!(sub.next().await, Some(7));
                drop(sub);

                let mut sub = shared.subscribe();
                assert_eq!(sub.next().await, Some(7));
                assert_eq!(shared.activations(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn equal_values_are_published_once() {
        LocalSet::new()
            .run_until(async {
                let input = Rc::new(ObservableCell::new(0u8));
                let source = Rc::clone(&input);
                let shared = Shared::new(move |publisher| {
                    let mut values = source.subscribe();
                    async move {
                        while let Some(v) = values.next().await {
                            let _ = publisher.publish(v / 2);
                        }
                    }
                });
                let mut sub = shared.subscribe();
                assert_eq!(sub.next().await, Some(0));

                input.set(1);
                input.set(2);
                assert_eq!(sub.next().await, Some(1));
                task::yield_now().await;
                assert_eq!(shared.current(), Some(1));
            })
            .await;
    }
}
