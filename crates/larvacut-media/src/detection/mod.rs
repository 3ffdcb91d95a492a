//! Larva detection.
//!
//! A [`Detector`] is trained on the first frames of a video and then asked,
//! on rescan frames, for the blobs currently in view. [`BlobDetector`] is the
//! production implementation: a [`ForegroundDetector`] mask fed through a
//! [`BlobExtractor`].

pub mod blob;
pub mod foreground;

#[cfg(feature = "opencv")]
pub mod opencv;

pub use blob::{BlobExtractor, ContourFinder, Detection, MAX_SIZE_FACTOR};
pub use foreground::{
    BackgroundModel, EdgeMasker, ForegroundDetector, Preprocessor, BACKGROUND_LEARNING_RATE,
};

#[cfg(feature = "opencv")]
pub use self::opencv::{CannyEdgeMasker, Mog2Background, OpenCvPreprocess, OuterContours};

use larvacut_models::CutterConfig;

use crate::error::MediaResult;
use crate::frame::Frame;

/// Source of per-frame larva detections.
pub trait Detector: Send {
    /// Feed a training frame to the underlying model.
    fn train(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Detections in `frame`, in a deterministic order.
    fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<Detection>>;
}

/// Foreground mask followed by size-filtered blob extraction.
pub struct BlobDetector<B, E, P, C> {
    foreground: ForegroundDetector<B, E, P>,
    extractor: BlobExtractor<C>,
}

impl<B, E, P, C> BlobDetector<B, E, P, C>
where
    B: BackgroundModel,
    E: EdgeMasker,
    P: Preprocessor,
    C: ContourFinder,
{
    pub fn new(foreground: ForegroundDetector<B, E, P>, extractor: BlobExtractor<C>) -> Self {
        Self {
            foreground,
            extractor,
        }
    }

    /// Wire the given stages with the size filter of `config`.
    pub fn from_config(background: B, edges: E, preprocess: P, contours: C, config: &CutterConfig) -> Self {
        Self::new(
            ForegroundDetector::new(background, edges, preprocess),
            BlobExtractor::new(contours, config.min_width, config.min_height),
        )
    }
}

impl<B, E, P, C> Detector for BlobDetector<B, E, P, C>
where
    B: BackgroundModel,
    E: EdgeMasker,
    P: Preprocessor,
    C: ContourFinder,
{
    fn train(&mut self, frame: &Frame) -> MediaResult<()> {
        self.foreground.train(frame)
    }

    fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let mask = self.foreground.mask(frame)?;
        let detections = self.extractor.extract(&mask)?;
        tracing::trace!(count = detections.len(), "Blobs detected");
        Ok(detections)
    }
}

/// The detector built from OpenCV stages.
#[cfg(feature = "opencv")]
pub type OpenCvDetector = BlobDetector<Mog2Background, CannyEdgeMasker, OpenCvPreprocess, OuterContours>;

/// Detector backed by OpenCV's MOG2 background model, Canny edge mask and
/// external contours.
#[cfg(feature = "opencv")]
pub fn default_detector(config: &CutterConfig, history: u64) -> MediaResult<OpenCvDetector> {
    let background = Mog2Background::new(history)?;
    let edges = CannyEdgeMasker::new()?;
    Ok(BlobDetector::from_config(
        background,
        edges,
        OpenCvPreprocess::from_config(config),
        OuterContours,
        config,
    ))
}
