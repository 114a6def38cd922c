//! Compositing of a sharp person over a blurred background.

use image::{
    imageops::{self, FilterType},
    GrayImage, Luma, Rgba, RgbaImage,
};

use crate::conf;

use super::ForegroundMask;

/// Parameters of [`draw_bokeh()`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BokehParams {
    /// Foreground probability from which a pixel is considered a person.
    pub foreground_threshold: f32,

    /// Blur sigma of the background.
    pub background_blur: f32,

    /// Blur sigma of the person boundary.
    pub edge_blur: f32,

    /// Whether the output is mirrored horizontally.
    pub flip_horizontal: bool,
}

impl From<&conf::Blur> for BokehParams {
    fn from(conf: &conf::Blur) -> Self {
        Self {
            foreground_threshold: conf.foreground_threshold,
            background_blur: conf.background_blur,
            edge_blur: conf.edge_blur,
            flip_horizontal: conf.flip_horizontal,
        }
    }
}

/// Composites the person found in the `frame` by its `mask` over the
/// blurred `frame`.
///
/// The mask is binarized at the foreground threshold and softened with the
/// edge blur, then used as the blending alpha of the original pixels.
/// A mask of a different size is stretched over the frame.
#[must_use]
pub fn draw_bokeh(
    frame: &RgbaImage,
    mask: &ForegroundMask,
    params: &BokehParams,
) -> RgbaImage {
    let (width, height) = frame.dimensions();

    let mut alpha = binarize(mask, params.foreground_threshold);
    if alpha.dimensions() != (width, height) {
        alpha = imageops::resize(&alpha, width, height, FilterType::Triangle);
    }
    if params.edge_blur > 0.0 {
        alpha = imageops::blur(&alpha, params.edge_blur);
    }
    let background = if params.background_blur > 0.0 {
        imageops::blur(frame, params.background_blur)
    } else {
        frame.clone()
    };

    let mut out = RgbaImage::from_fn(width, height, |x, y| {
        let a = f32::from(alpha.get_pixel(x, y)[0]) / 255.0;
        let Rgba(sharp) = *frame.get_pixel(x, y);
        let Rgba(blurred) = *background.get_pixel(x, y);
        Rgba([
            blend(sharp[0], blurred[0], a),
            blend(sharp[1], blurred[1], a),
            blend(sharp[2], blurred[2], a),
            sharp[3],
        ])
    });
    if params.flip_horizontal {
        imageops::flip_horizontal_in_place(&mut out);
    }
    out
}

/// Turns the `mask` into a fully opaque person over a fully transparent
/// background.
fn binarize(mask: &ForegroundMask, threshold: f32) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] >= threshold {
            Luma([u8::MAX])
        } else {
            Luma([0])
        }
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(sharp: u8, blurred: u8, alpha: f32) -> u8 {
    let v = f32::from(sharp) * alpha + f32::from(blurred) * (1.0 - alpha);
    v.round().clamp(0.0, 255.0) as u8
}
