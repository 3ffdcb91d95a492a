//! Container video files decoded through OpenCV.

use std::path::{Path, PathBuf};

use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH,
    },
};
use tracing::{debug, warn};

use super::{FrameSource, SourceInfo};
use crate::cv::mat_to_frame;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// Sequential reader over any container OpenCV can open.
pub struct VideoFileSource {
    path: PathBuf,
    capture: VideoCapture,
    info: SourceInfo,
    frame: Mat,
}

impl VideoFileSource {
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::invalid_video(format!("non UTF-8 path: {}", path.display())))?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| MediaError::invalid_video(format!("Failed to open video: {e}")))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::invalid_video(format!(
                "Failed to open video file: {}",
                path.display()
            )));
        }

        let property = |prop: i32| capture.get(prop).unwrap_or(0.0);
        let info = SourceInfo {
            width: property(CAP_PROP_FRAME_WIDTH) as u32,
            height: property(CAP_PROP_FRAME_HEIGHT) as u32,
            total_frames: property(CAP_PROP_FRAME_COUNT).max(0.0) as u64,
            fps: property(CAP_PROP_FPS),
        };
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::invalid_video(format!(
                "{} reports no frame size",
                path.display()
            )));
        }
        if info.total_frames == 0 {
            warn!(path = %path.display(), "Container does not report a frame count");
        }
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            frames = info.total_frames,
            fps = info.fps,
            "Opened video"
        );

        Ok(Self {
            path,
            capture,
            info,
            frame: Mat::default(),
        })
    }
}

impl FrameSource for VideoFileSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self) -> MediaResult<Option<Frame>> {
        let grabbed = self.capture.read(&mut self.frame).map_err(|e| {
            MediaError::decode_failed(format!("{}: {e}", self.path.display()))
        })?;
        if !grabbed || self.frame.empty() {
            return Ok(None);
        }
        mat_to_frame(&self.frame).map(Some)
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(path = %self.path.display(), "Failed to release capture: {e}");
        }
    }
}
