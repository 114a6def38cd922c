//! Local media orchestration: camera, microphone and screen capture with
//! lazily acquired devices, background blur and noise suppression.
//!
//! Everything is single-threaded and must run inside a
//! [`LocalSet`](tokio::task::LocalSet).

// TODO: Remove `clippy::must_use_candidate` once the issue below is resolved:
//       https://github.com/rust-lang/rust-clippy/issues/4779
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unused_qualifications
)]

pub mod conf;
pub mod effects;
pub mod log;
pub mod media;
pub mod platform;
pub mod settings;
pub mod user_media;

#[doc(inline)]
pub use self::{
    conf::Conf,
    media::{
        GateState, InputDeviceInfo, MediaKind, ScreenShareOptions, Track,
        TrackOrigin, UnavailabilityReason,
    },
    user_media::{open_settings_store, Platform, SelectDeviceError, UserMedia},
};
