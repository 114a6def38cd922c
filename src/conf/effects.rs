//! Track effects settings.

use std::time::Duration;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Track effects settings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Effects {
    /// Background blur settings.
    pub blur: Blur,

    /// Segmentation engine settings.
    pub segmenter: Segmenter,
}

/// Background blur settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Blur {
    /// Interval between rendered frames.
    ///
    /// Defaults to `33ms` (30 frames per second).
    #[default(Duration::from_millis(33))]
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,

    /// Foreground probability from which a pixel is considered a person.
    ///
    /// Defaults to `0.6`.
    #[default(0.6)]
    pub foreground_threshold: f32,

    /// Blur strength of the background.
    ///
    /// Defaults to `12.0`.
    #[default(12.0)]
    pub background_blur: f32,

    /// Blur strength of the person boundary.
    ///
    /// Defaults to `3.0`.
    #[default(3.0)]
    pub edge_blur: f32,

    /// Whether the blurred video is mirrored horizontally.
    ///
    /// Defaults to `false`.
    #[default(false)]
    pub flip_horizontal: bool,
}

/// Segmentation engine settings.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Segmenter {
    /// Model the engine is loaded with.
    pub model: SegmenterModel,
}

/// Segmentation models.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    PartialEq,
    Serialize,
    SmartDefault,
)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterModel {
    /// Model for arbitrary framing.
    #[default]
    #[display(fmt = "general")]
    General,

    /// Model tuned for landscape framing.
    #[display(fmt = "landscape")]
    Landscape,
}
