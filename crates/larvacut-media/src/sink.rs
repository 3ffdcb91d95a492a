//! Clip writers.
//!
//! Every open segment owns one [`ClipWriter`]. Writers are consumed by
//! [`ClipWriter::finish`], so a segment cannot write after it was closed.

use std::path::Path;

use crate::error::MediaResult;
use crate::frame::Frame;

/// Encoder for one fixed-size clip file.
pub trait ClipWriter: Send {
    /// Append one frame; its size must match the size the clip was opened with.
    fn write(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Flush and close the container.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

/// Opens clip writers.
pub trait ClipSinkFactory: Send {
    fn open(&mut self, path: &Path, width: u32, height: u32, fps: f64) -> MediaResult<Box<dyn ClipWriter>>;
}

#[cfg(feature = "opencv")]
pub use self::opencv_sink::{OpenCvClipSink, OpenCvClipWriter};

#[cfg(feature = "opencv")]
mod opencv_sink {
    use std::path::{Path, PathBuf};

    use opencv::{
        core::Size,
        prelude::*,
        videoio::VideoWriter,
    };

    use super::{ClipSinkFactory, ClipWriter};
    use crate::cv::frame_to_mat;
    use crate::error::{MediaError, MediaResult};
    use crate::frame::Frame;

    /// Motion-JPEG writer factory producing grayscale clips.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OpenCvClipSink;

    impl ClipSinkFactory for OpenCvClipSink {
        fn open(
            &mut self,
            path: &Path,
            width: u32,
            height: u32,
            fps: f64,
        ) -> MediaResult<Box<dyn ClipWriter>> {
            Ok(Box::new(OpenCvClipWriter::create(path, width, height, fps)?))
        }
    }

    /// One open MJPG clip.
    pub struct OpenCvClipWriter {
        path: PathBuf,
        writer: VideoWriter,
        width: u32,
        height: u32,
    }

    impl OpenCvClipWriter {
        pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> MediaResult<Self> {
            let path_str = path.to_str().ok_or_else(|| {
                MediaError::encode_failed(format!("non UTF-8 path: {}", path.display()))
            })?;
            let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')
                .map_err(|e| MediaError::encode_failed(format!("fourcc: {e}")))?;
            let writer = VideoWriter::new(
                path_str,
                fourcc,
                fps,
                Size::new(width as i32, height as i32),
                false,
            )
            .map_err(|e| MediaError::encode_failed(format!("Failed to create video writer: {e}")))?;

            if !writer.is_opened().unwrap_or(false) {
                return Err(MediaError::encode_failed(format!(
                    "Failed to open video writer: {}",
                    path.display()
                )));
            }

            Ok(Self {
                path: path.to_path_buf(),
                writer,
                width,
                height,
            })
        }
    }

    impl ClipWriter for OpenCvClipWriter {
        fn write(&mut self, frame: &Frame) -> MediaResult<()> {
            if frame.width() != self.width || frame.height() != self.height {
                return Err(MediaError::ShapeMismatch {
                    expected: format!("{}x{}", self.width, self.height),
                    actual: format!("{}x{}", frame.width(), frame.height()),
                });
            }
            let mat = frame_to_mat(frame)?;
            self.writer
                .write(&mat)
                .map_err(|e| MediaError::encode_failed(format!("{}: {e}", self.path.display())))
        }

        fn finish(mut self: Box<Self>) -> MediaResult<()> {
            self.writer
                .release()
                .map_err(|e| MediaError::encode_failed(format!("{}: {e}", self.path.display())))
        }
    }
}
