//! Run driver: validation, output folder, training, tracking, sidecar files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use larvacut_models::CutterConfig;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::detection::Detector;
use crate::error::MediaResult;
use crate::fs_utils::{create_unique_dir, video_base_name};
use crate::metadata_log::{MetadataLog, LOG_FILE_NAME};
use crate::progress::{NoopProgress, ProgressObserver, STATUS_CUTTING, STATUS_DONE, STATUS_TRAINING};
use crate::quality::SharpnessScorer;
use crate::sink::ClipSinkFactory;
use crate::source::FrameSource;
use crate::tracker::{OutputTarget, RunEnd, SegmentTracker};

/// File name of the configuration dump inside the output folder.
pub const PROFILE_FILE_NAME: &str = "cutter_profile.txt";

/// Summary of one cutting run.
#[derive(Debug, Clone, Serialize)]
pub struct CutReport {
    /// Folder holding the clips, log and profile
    pub output_dir: PathBuf,
    /// Video the clips were cut from
    pub parent_video: String,
    pub segments_opened: u64,
    pub segments_kept: u64,
    pub segments_deleted: u64,
    /// Frames processed after training
    pub frames_processed: u64,
    /// Frames consumed by background training
    pub training_frames: u64,
    /// Whether the run was stopped by the cancel signal
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

/// Cuts one video into per-larva clips.
pub struct MovieCutter {
    config: CutterConfig,
    output_root: PathBuf,
    progress: Box<dyn ProgressObserver>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl MovieCutter {
    /// Create a cutter writing output folders under `output_root`.
    pub fn new(config: CutterConfig, output_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_root: output_root.into(),
            progress: Box::new(NoopProgress),
            cancel_rx: None,
        }
    }

    /// Set the progress observer.
    pub fn with_progress(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.progress = Box::new(observer);
        self
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &CutterConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Cut `source`, read from `video_path`, into clips.
    ///
    /// Configuration errors are reported before any frame is read or any
    /// folder is created. Once the output folder exists, the log and profile
    /// are written even when the run fails.
    pub fn run(
        &self,
        video_path: &Path,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        scorer: Box<dyn SharpnessScorer>,
        sinks: Box<dyn ClipSinkFactory>,
    ) -> MediaResult<CutReport> {
        let start = Instant::now();
        let info = source.info();
        self.config.validate_for_frame(info.width, info.height)?;

        let base_name = video_base_name(video_path);
        let output_dir = create_unique_dir(&self.output_root, &base_name)?;
        let parent_video = video_path.display().to_string();
        info!(
            video = %parent_video,
            output_dir = %output_dir.display(),
            width = info.width,
            height = info.height,
            total_frames = info.total_frames,
            "Starting cut"
        );

        self.progress.set_status(STATUS_TRAINING);
        let training_frames = match self.train(source, detector, info.total_frames) {
            Ok(count) => count,
            Err(e) => {
                self.write_sidecars(&output_dir, &MetadataLog::new());
                return Err(e);
            }
        };

        let mut tracker = SegmentTracker::new(
            self.config.clone(),
            info.width,
            info.height,
            OutputTarget {
                dir: output_dir.clone(),
                base_name,
                parent_video: parent_video.clone(),
            },
            training_frames,
            sinks,
            scorer,
        );

        let end = if self.is_cancelled() {
            info!("Cancelled during training, skipping cutting");
            RunEnd::Cancelled
        } else {
            self.progress.set_status(STATUS_CUTTING);
            let progress_max = info.total_frames.saturating_sub(training_frames);
            let result = tracker.run(
                source,
                detector,
                self.progress.as_ref(),
                progress_max,
                self.cancel_rx.as_ref(),
            );
            match result {
                Ok(end) => end,
                Err(e) => {
                    self.write_sidecars(&output_dir, tracker.log());
                    return Err(e);
                }
            }
        };

        self.write_profile(&output_dir)?;
        tracker.log().write_to(output_dir.join(LOG_FILE_NAME))?;
        self.progress.set_status(STATUS_DONE);

        let stats = tracker.stats();
        let elapsed_secs = start.elapsed().as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            (stats.frames_processed + training_frames) as f64 / elapsed_secs
        } else {
            0.0
        };
        info!(
            output_dir = %output_dir.display(),
            clips_kept = stats.segments_kept,
            clips_deleted = stats.segments_deleted,
            frames = stats.frames_processed,
            elapsed_secs = format!("{elapsed_secs:.2}"),
            fps = format!("{throughput:.2}"),
            cancelled = end == RunEnd::Cancelled,
            "Cut complete"
        );

        Ok(CutReport {
            output_dir,
            parent_video,
            segments_opened: stats.segments_opened,
            segments_kept: stats.segments_kept,
            segments_deleted: stats.segments_deleted,
            frames_processed: stats.frames_processed,
            training_frames,
            cancelled: end == RunEnd::Cancelled,
            elapsed_secs,
        })
    }

    /// Feed up to the configured number of frames to the detector.
    ///
    /// Returns how many frames were consumed; fewer than requested when the
    /// source runs out or the run is cancelled.
    fn train(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        total_frames: u64,
    ) -> MediaResult<u64> {
        let wanted = self.config.training_frames(total_frames);
        let mut trained = 0;
        while trained < wanted {
            if self.is_cancelled() {
                break;
            }
            let Some(frame) = source.read()? else {
                warn!(trained, wanted, "Source ran out during background training");
                break;
            };
            detector.train(&frame)?;
            trained += 1;
        }
        info!(frames = trained, "Background model trained");
        Ok(trained)
    }

    fn write_profile(&self, output_dir: &Path) -> MediaResult<()> {
        std::fs::write(output_dir.join(PROFILE_FILE_NAME), self.config.to_string())?;
        Ok(())
    }

    /// Best-effort sidecar write on the failure path.
    fn write_sidecars(&self, output_dir: &Path, log: &MetadataLog) {
        if let Err(e) = log.write_to(output_dir.join(LOG_FILE_NAME)) {
            warn!(output_dir = %output_dir.display(), "Failed to write log: {e}");
        }
        if let Err(e) = self.write_profile(output_dir) {
            warn!(output_dir = %output_dir.display(), "Failed to write profile: {e}");
        }
    }
}
