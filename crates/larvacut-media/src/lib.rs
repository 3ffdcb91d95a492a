//! Fish larvae detection and clip segmentation engine.
//!
//! This crate provides:
//! - Owned frame and mask buffers
//! - Foreground detection (background subtraction gated by an edge mask)
//! - Outer-contour blob extraction and fixed-size crop geometry
//! - Sharpness scoring and the blurry-clip filter
//! - The segment tracker and the [`MovieCutter`] run driver
//! - Frame sources (SEQ files, and containers via OpenCV) and clip sinks
//!
//! The OpenCV-backed models, sources and sinks live behind the `opencv`
//! feature (enabled by default). Everything else is plain Rust, so the
//! engine can be driven by any [`FrameSource`], [`Detector`],
//! [`SharpnessScorer`] and [`ClipSinkFactory`].

pub mod crop;
pub mod cutter;
pub mod detection;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod metadata_log;
pub mod metrics;
pub mod progress;
pub mod quality;
pub mod sink;
pub mod source;
pub mod tracker;

#[cfg(feature = "opencv")]
mod cv;

pub use crop::crop_window;
pub use cutter::{CutReport, MovieCutter, PROFILE_FILE_NAME};
pub use detection::{
    BackgroundModel, BlobDetector, BlobExtractor, ContourFinder, Detection, Detector, EdgeMasker,
    ForegroundDetector, Preprocessor,
};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, Mask};
pub use metadata_log::{MetadataLog, LOG_FILE_NAME};
pub use progress::{NoopProgress, ProgressObserver, TracingProgress};
pub use quality::{QualityFilter, QualityVerdict, SharpnessScorer};
pub use sink::{ClipSinkFactory, ClipWriter};
pub use source::{open_source, FrameSource, SeqReader, SourceInfo};
pub use tracker::{SegmentTracker, TrackerStats};

#[cfg(feature = "opencv")]
pub use detection::{
    default_detector, CannyEdgeMasker, Mog2Background, OpenCvDetector, OpenCvPreprocess,
    OuterContours,
};
#[cfg(feature = "opencv")]
pub use quality::LaplacianVariance;
#[cfg(feature = "opencv")]
pub use sink::OpenCvClipSink;
#[cfg(feature = "opencv")]
pub use source::VideoFileSource;
