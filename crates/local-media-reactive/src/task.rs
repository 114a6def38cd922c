//! Spawned [`Future`]s which are dropped synchronously together with their
//! handle.
//!
//! [`Future`]: std::future::Future

use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    rc::Rc,
    task::{Poll, Waker},
};

use futures::future::{self, FutureExt as _, LocalBoxFuture};

/// Shared state of a [`Task`] and its executor-side driver.
struct Inner {
    /// Spawned [`Future`]. [`None`] once finished or cancelled.
    future: RefCell<Option<LocalBoxFuture<'static, ()>>>,

    /// [`Waker`] of the driver, used to let it complete after cancellation.
    waker: RefCell<Option<Waker>>,

    /// Set once the owning [`Task`] is dropped.
    cancelled: Cell<bool>,
}

/// Handle to a [`Future`] spawned onto the current
/// [`LocalSet`](tokio::task::LocalSet).
///
/// Unlike a [`JoinHandle::abort()`](tokio::task::JoinHandle::abort), which
/// only schedules cancellation, dropping a [`Task`] drops the spawned
/// [`Future`] (and everything it owns) before [`Drop::drop`] returns.
///
/// The only exception is a [`Task`] dropped from inside its own [`Future`]:
/// that [`Future`] is dropped right after its current poll returns.
pub struct Task(Rc<Inner>);

impl Task {
    /// Spawns the provided `fut` onto the current
    /// [`LocalSet`](tokio::task::LocalSet).
    ///
    /// # Panics
    ///
    /// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        let inner = Rc::new(Inner {
            future: RefCell::new(Some(fut.boxed_local())),
            waker: RefCell::new(None),
            cancelled: Cell::new(false),
        });

        let driver = Rc::clone(&inner);
        drop(tokio::task::spawn_local(future::poll_fn(move |cx| {
            if driver.cancelled.get() {
                drop(driver.future.borrow_mut().take());
                return Poll::Ready(());
            }
            *driver.waker.borrow_mut() = Some(cx.waker().clone());

            let mut slot = driver.future.borrow_mut();
            let finished = match slot.as_mut() {
                Some(fut) => fut.as_mut().poll(cx).is_ready(),
                None => true,
            };
            if finished || driver.cancelled.get() {
                let fut = slot.take();
                drop(slot);
                drop(fut);
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })));

        Self(inner)
    }

    /// Indicates whether the spawned [`Future`] has completed or has been
    /// cancelled.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.0
            .future
            .try_borrow()
            .map(|slot| slot.is_none())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.0.cancelled.get())
            .finish()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.0.cancelled.set(true);
        // Fails only if we are being dropped from inside the spawned future,
        // in which case the driver drops it after the poll.
        if let Ok(mut slot) = self.0.future.try_borrow_mut() {
            let fut = slot.take();
            drop(slot);
            drop(fut);
        }
        if let Some(waker) = self.0.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

/// Spawns the provided `fut` onto the current
/// [`LocalSet`](tokio::task::LocalSet) without keeping a handle to it.
///
/// # Panics
///
/// If called outside of a [`LocalSet`](tokio::task::LocalSet) context.
#[inline]
pub fn spawn_detached<F>(fut: F)
where
    F: Future<Output = ()> + 'static,
{
    drop(tokio::task::spawn_local(fut));
}

#[cfg(test)]
mod spec {
    use std::{cell::Cell, rc::Rc};

    use futures::future;
    use tokio::task::{self, LocalSet};

    use super::Task;

    /// Sets the shared flag when dropped.
    struct DropFlag(Rc<Cell<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[tokio::test]
    async fn dropping_task_drops_future_synchronously() {
        LocalSet::new()
            .run_until(async {
                let dropped = Rc::new(Cell::new(false));
                let guard = DropFlag(Rc::clone(&dropped));
                let handle = Task::spawn(async move {
                    let _guard = guard;
                    future::pending::<()>().await;
                });
                task::yield_now().await;
                assert!(!dropped.get());

                drop(handle);
                assert!(dropped.get());
            })
            .await;
    }

    #[tokio::test]
    async fn task_not_polled_yet_is_dropped_too() {
        LocalSet::new()
            .run_until(async {
                let dropped = Rc::new(Cell::new(false));
                let guard = DropFlag(Rc::clone(&dropped));
                let handle = Task::spawn(async move {
                    let _guard = guard;
                });
                drop(handle);
                assert!(dropped.get());
            })
            .await;
    }

    #[tokio::test]
    async fn finished_task_reports_it() {
        LocalSet::new()
            .run_until(async {
                let handle = Task::spawn(async {});
                task::yield_now().await;
                task::yield_now().await;
                assert!(handle.is_finished());
            })
            .await;
    }
}
