//! Person segmentation engine and its process-wide cache.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use derive_more::Display;
use image::{ImageBuffer, Luma, RgbaImage};
use once_cell::sync::OnceCell as GlobalCell;
use tokio::sync::OnceCell;
use tracerr::Traced;

use crate::conf;

/// Per-pixel probability of a pixel belonging to a person, in `0.0..=1.0`.
pub type ForegroundMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Errors of a segmentation engine.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SegmentationError {
    /// Engine could not be loaded.
    #[display(fmt = "Failed to load segmentation model: {}", _0)]
    Load(String),

    /// Segmentation of a frame failed.
    #[display(fmt = "Failed to segment frame: {}", _0)]
    Inference(String),
}

/// Loaded segmentation engine.
#[async_trait]
pub trait Segmenter: fmt::Debug + Send + Sync {
    /// Segments people in the provided `frame`.
    async fn segment_people(
        &self,
        frame: &RgbaImage,
    ) -> Result<ForegroundMask, Traced<SegmentationError>>;
}

/// Loader of a [`Segmenter`].
#[async_trait]
pub trait SegmenterLoader: Send + Sync {
    /// Loads a [`Segmenter`] configured with the provided `conf`.
    async fn create_segmenter(
        &self,
        conf: &conf::Segmenter,
    ) -> Result<Arc<dyn Segmenter>, Traced<SegmentationError>>;
}

/// Process-wide [`Segmenter`] loaded on the first use.
///
/// Concurrent first uses wait for the same load. A failed load is not
/// cached, so the next use tries again.
pub struct SegmenterCache {
    loader: Box<dyn SegmenterLoader>,
    conf: conf::Segmenter,
    segmenter: OnceCell<Arc<dyn Segmenter>>,
}

impl fmt::Debug for SegmenterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmenterCache")
            .field("conf", &self.conf)
            .field("segmenter", &self.segmenter.get())
            .finish()
    }
}

/// [`SegmenterCache`] installed for the whole process.
static GLOBAL: GlobalCell<Arc<SegmenterCache>> = GlobalCell::new();

impl SegmenterCache {
    /// Creates a new empty [`SegmenterCache`].
    #[must_use]
    pub fn new<L>(loader: L, conf: conf::Segmenter) -> Self
    where
        L: SegmenterLoader + 'static,
    {
        Self {
            loader: Box::new(loader),
            conf,
            segmenter: OnceCell::new(),
        }
    }

    /// Returns the cached [`Segmenter`], loading it if there is none yet.
    ///
    /// # Errors
    ///
    /// If loading fails.
    pub async fn get(
        &self,
    ) -> Result<Arc<dyn Segmenter>, Traced<SegmentationError>> {
        self.segmenter
            .get_or_try_init(|| async {
                log::info!("Loading {} segmentation model", self.conf.model);
                self.loader.create_segmenter(&self.conf).await
            })
            .await
            .map(Arc::clone)
            .map_err(tracerr::wrap!())
    }

    /// Indicates whether the [`Segmenter`] has been loaded.
    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.segmenter.initialized()
    }

    /// Returns the process-wide [`SegmenterCache`], installing the one
    /// created by `init` if there is none yet.
    ///
    /// Every [`UserMedia`] built with the returned cache shares one loaded
    /// [`Segmenter`].
    ///
    /// [`UserMedia`]: crate::UserMedia
    pub fn global_or_install<F>(init: F) -> Arc<SegmenterCache>
    where
        F: FnOnce() -> SegmenterCache,
    {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(init())))
    }

    /// Returns the process-wide [`SegmenterCache`], if installed.
    #[inline]
    #[must_use]
    pub fn global() -> Option<Arc<SegmenterCache>> {
        GLOBAL.get().cloned()
    }
}
