//! Reactive containers used by the local media orchestration layer.
//!
//! Everything in this crate is single-threaded: values live in [`Rc`]s and
//! [`RefCell`]s, and background work is spawned onto the current
//! [`tokio::task::LocalSet`].
//!
//!
//!
//!
//! # Observing a value
//!
//! ```
//! use local_media_reactive::ObservableCell;
//! # use futures::{executor, StreamExt as _};
//!
//! # executor::block_on(async {
//! let enabled = ObservableCell::new(false);
//! let mut changes = enabled.subscribe();
//!
//! // Current value is emitted first:
//! assert_eq!(changes.next().await.unwrap(), false);
//!
//! enabled.set(true);
//! assert_eq!(changes.next().await.unwrap(), true);
//!
//! // Setting the same value again emits nothing.
//! enabled.set(true);
//! enabled.set(false);
//! assert_eq!(changes.next().await.unwrap(), false);
//! # });
//! ```
//!
//!
//!
//!
//! # Sharing a derived value
//!
//! A [`Shared`] value is computed by a producer task which runs only while
//! somebody holds a [`Subscription`] to it. The first subscriber starts the
//! producer, the last one to leave drops it (together with everything the
//! producer owns) before [`Drop`] returns.
//!
//! ```
//! use local_media_reactive::Shared;
//! # use futures::StreamExt as _;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # tokio::task::LocalSet::new().run_until(async {
//! let answer = Shared::new(|publisher| async move {
//!     publisher.publish(42);
//!     futures::future::pending::<()>().await;
//! });
//!
//! let mut first = answer.subscribe();
//! let second = answer.subscribe();
//! assert_eq!(answer.observers(), 2);
//! assert_eq!(first.next().await, Some(42));
//!
//! drop(first);
//! drop(second);
//! assert!(!answer.is_active());
//! # }).await;
//! # }
//! ```
//!
//! [`Rc`]: std::rc::Rc
//! [`RefCell`]: std::cell::RefCell

#![deny(
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts
)]
#![forbid(unsafe_code)]
#![warn(
    deprecated_in_future,
    missing_docs,
    unreachable_pub,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod cell;
pub mod shared;
pub mod task;

#[doc(inline)]
pub use self::{
    cell::{DroppedError, ObservableCell},
    shared::{Publisher, Shared, Subscription},
    task::Task,
};
