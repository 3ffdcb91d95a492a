//! Sequential frame sources.

pub mod seq;
#[cfg(feature = "opencv")]
pub mod video;

use std::path::Path;

use serde::Serialize;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

pub use seq::{SeqHeader, SeqReader};
#[cfg(feature = "opencv")]
pub use video::VideoFileSource;

/// Static properties of an opened source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Total number of frames, 0 when the container does not say
    pub total_frames: u64,
    /// Nominal frame rate
    pub fps: f64,
}

/// Ordered frames read one at a time.
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// Next frame, or `None` once the source is exhausted.
    fn read(&mut self) -> MediaResult<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn read(&mut self) -> MediaResult<Option<Frame>> {
        (**self).read()
    }
}

/// Open `path` with the reader matching its extension.
///
/// `.seq` files use the built-in SEQ reader; everything else goes through
/// OpenCV's container support.
pub fn open_source(path: impl AsRef<Path>) -> MediaResult<Box<dyn FrameSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let is_seq = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("seq"));

    if is_seq {
        return Ok(Box::new(SeqReader::open(path)?));
    }
    open_container(path)
}

#[cfg(feature = "opencv")]
fn open_container(path: &Path) -> MediaResult<Box<dyn FrameSource>> {
    Ok(Box::new(VideoFileSource::open(path)?))
}

#[cfg(not(feature = "opencv"))]
fn open_container(path: &Path) -> MediaResult<Box<dyn FrameSource>> {
    Err(MediaError::UnsupportedFormat(format!(
        "{} (built without OpenCV, only .seq files can be read)",
        path.display()
    )))
}
