//! Per-frame segment state machine.
//!
//! Every open segment follows one detection key: it was opened on a rescan
//! frame, receives one crop per frame in lock-step with the others, and is
//! closed once it holds `target_length + 1` frames. Closing runs the quality
//! filter, which may delete the clip and its log row.
//!
//! ```text
//! UNTRACKED --rescan--> OPEN --full / re-detected / end of stream--> KEPT | DELETED
//!                         \--fatal error--> ABORTED (file and row removed)
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use larvacut_models::{CropWindow, CutterConfig, DetectionKey, LogEntry};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::crop::crop_window;
use crate::detection::{Detection, Detector};
use crate::error::MediaResult;
use crate::fs_utils::{clip_stem, remove_if_exists, unique_clip_name};
use crate::frame::Frame;
use crate::metadata_log::MetadataLog;
use crate::metrics;
use crate::progress::{ProgressObserver, PROGRESS_EVERY};
use crate::quality::{QualityFilter, QualityVerdict, SharpnessScorer};
use crate::sink::{ClipSinkFactory, ClipWriter};
use crate::source::FrameSource;

/// Stable handle of a segment in the tracker's arena.
pub type SegmentId = u64;

/// Where clips are written and how they are named.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    /// Folder receiving the clips
    pub dir: PathBuf,
    /// Prefix of every clip name
    pub base_name: String,
    /// Parent video path recorded in the log
    pub parent_video: String,
}

/// Counters describing a tracker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub segments_opened: u64,
    pub segments_kept: u64,
    pub segments_deleted: u64,
    pub frames_processed: u64,
}

/// How a run over a source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The source ran out of frames.
    Exhausted,
    /// The cancel signal was raised between two frames.
    Cancelled,
}

/// A clip being written.
struct TrackedSegment {
    key: DetectionKey,
    window: CropWindow,
    writer: Option<Box<dyn ClipWriter>>,
    frames_written: u64,
    scores: Vec<f64>,
    path: PathBuf,
    clip_name: String,
    start_frame: u64,
}

/// Opens, feeds, closes and evaluates segments frame by frame.
pub struct SegmentTracker {
    config: CutterConfig,
    frame_width: u32,
    frame_height: u32,
    output: OutputTarget,
    /// Parent-video index of loop frame 0 (frames consumed by training).
    frame_offset: u64,
    sinks: Box<dyn ClipSinkFactory>,
    scorer: Box<dyn SharpnessScorer>,
    segments: BTreeMap<SegmentId, TrackedSegment>,
    by_key: HashMap<DetectionKey, SegmentId>,
    next_id: SegmentId,
    loop_counter: u64,
    quality: QualityFilter,
    log: MetadataLog,
    used_names: HashSet<String>,
    stats: TrackerStats,
}

impl SegmentTracker {
    pub fn new(
        config: CutterConfig,
        frame_width: u32,
        frame_height: u32,
        output: OutputTarget,
        frame_offset: u64,
        sinks: Box<dyn ClipSinkFactory>,
        scorer: Box<dyn SharpnessScorer>,
    ) -> Self {
        let quality = QualityFilter::new(config.quality_drop);
        Self {
            config,
            frame_width,
            frame_height,
            output,
            frame_offset,
            sinks,
            scorer,
            segments: BTreeMap::new(),
            by_key: HashMap::new(),
            next_id: 0,
            loop_counter: 0,
            quality,
            log: MetadataLog::new(),
            used_names: HashSet::new(),
            stats: TrackerStats::default(),
        }
    }

    pub fn log(&self) -> &MetadataLog {
        &self.log
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Number of segments currently being written.
    pub fn open_segments(&self) -> usize {
        self.segments.len()
    }

    /// Whether the next processed frame triggers a detection scan.
    pub fn is_rescan_frame(&self) -> bool {
        self.loop_counter % self.config.rescan_interval() == 0
    }

    /// Drive the tracker over every remaining frame of `source`.
    ///
    /// Exhaustion and cancellation both close every open segment with a full
    /// quality evaluation. Any error aborts the open segments, removing their
    /// files and log rows, before it is returned.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        progress: &dyn ProgressObserver,
        progress_max: u64,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> MediaResult<RunEnd> {
        let result = self.run_frames(source, detector, progress, progress_max, cancel);
        match result {
            Ok(end) => {
                if let Err(e) = self.close_all() {
                    self.abort_all();
                    return Err(e);
                }
                progress.set_progress(self.loop_counter, progress_max);
                Ok(end)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    open_segments = self.segments.len(),
                    frame = self.loop_counter,
                    "Cutting failed, removing unfinished clips"
                );
                self.abort_all();
                Err(e)
            }
        }
    }

    fn run_frames(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        progress: &dyn ProgressObserver,
        progress_max: u64,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> MediaResult<RunEnd> {
        loop {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                info!(frame = self.loop_counter, "Cutting cancelled");
                return Ok(RunEnd::Cancelled);
            }
            let Some(frame) = source.read()? else {
                return Ok(RunEnd::Exhausted);
            };
            self.process_frame(&frame, detector)?;
            if self.loop_counter % PROGRESS_EVERY == 0 {
                progress.set_progress(self.loop_counter, progress_max);
            }
        }
    }

    /// Handle one frame: optional rescan, then one crop for every open segment.
    pub fn process_frame(&mut self, frame: &Frame, detector: &mut dyn Detector) -> MediaResult<()> {
        if self.is_rescan_frame() {
            let detections = detector.detect(frame)?;
            debug!(
                frame = self.parent_frame(),
                detections = detections.len(),
                open_segments = self.segments.len(),
                "Rescan"
            );
            for detection in &detections {
                if let Some(&id) = self.by_key.get(&detection.key) {
                    self.close_segment(id)?;
                }
                self.open_segment(detection)?;
            }
        }

        self.write_open_segments(frame)?;
        self.loop_counter += 1;
        self.stats.frames_processed += 1;
        metrics::record_frame_processed();
        Ok(())
    }

    /// Close every open segment with a full quality evaluation.
    pub fn close_all(&mut self) -> MediaResult<()> {
        let ids: Vec<SegmentId> = self.segments.keys().copied().collect();
        for id in ids {
            self.close_segment(id)?;
        }
        Ok(())
    }

    /// Drop every open segment without evaluation, deleting its file and row.
    pub fn abort_all(&mut self) {
        let segments = std::mem::take(&mut self.segments);
        self.by_key.clear();
        for (_, mut segment) in segments {
            if let Some(writer) = segment.writer.take() {
                if let Err(e) = writer.finish() {
                    debug!(clip = %segment.clip_name, "Ignoring release error on abort: {e}");
                }
            }
            self.discard(&segment, "aborted");
        }
    }

    fn parent_frame(&self) -> u64 {
        self.frame_offset + self.loop_counter
    }

    fn open_segment(&mut self, detection: &Detection) -> MediaResult<()> {
        let window = crop_window(
            detection.centroid,
            self.config.padding,
            self.frame_width,
            self.frame_height,
        )?;
        let start_frame = self.parent_frame();
        let stem = clip_stem(&self.output.base_name, start_frame, detection.centroid);
        let clip_name = unique_clip_name(
            &self.output.dir,
            &stem,
            self.config.extension(),
            &self.used_names,
        )?;
        let path = self.output.dir.join(&clip_name);

        let writer = self
            .sinks
            .open(&path, window.width(), window.height(), self.config.fps_out)?;

        self.used_names.insert(clip_name.clone());
        self.log.add(LogEntry::new(
            clip_name.clone(),
            self.output.parent_video.clone(),
            start_frame,
            detection.centroid,
        ));

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            segment = id,
            clip = %clip_name,
            key = %detection.key,
            centroid = %detection.centroid,
            "Segment opened"
        );
        self.segments.insert(
            id,
            TrackedSegment {
                key: detection.key,
                window,
                writer: Some(writer),
                frames_written: 0,
                scores: Vec::new(),
                path,
                clip_name,
                start_frame,
            },
        );
        self.by_key.insert(detection.key, id);
        self.stats.segments_opened += 1;
        metrics::record_segment_opened();
        Ok(())
    }

    fn write_open_segments(&mut self, frame: &Frame) -> MediaResult<()> {
        if self.segments.is_empty() {
            return Ok(());
        }
        let brighten = self.config.apply_brightness.then_some(self.config.brighten);
        let frames_per_clip = self.config.frames_per_clip();

        let mut full = Vec::new();
        for (&id, segment) in self.segments.iter_mut() {
            let crop = frame.crop(&segment.window)?;
            let crop = match brighten {
                Some(beta) => crop.brightened(beta),
                None => crop,
            };
            if let Some(writer) = segment.writer.as_mut() {
                writer.write(&crop)?;
            }
            segment.scores.push(self.scorer.score(&frame.region(&segment.key))?);
            segment.frames_written += 1;
            if segment.frames_written >= frames_per_clip {
                full.push(id);
            }
        }

        for id in full {
            self.close_segment(id)?;
        }
        Ok(())
    }

    fn close_segment(&mut self, id: SegmentId) -> MediaResult<()> {
        let Some(mut segment) = self.segments.remove(&id) else {
            return Ok(());
        };
        if self.by_key.get(&segment.key) == Some(&id) {
            self.by_key.remove(&segment.key);
        }

        if let Some(writer) = segment.writer.take() {
            if let Err(e) = writer.finish() {
                self.discard(&segment, "aborted");
                return Err(e);
            }
        }

        match self.quality.evaluate(&segment.scores) {
            QualityVerdict::Keep { mean, baseline } => {
                self.stats.segments_kept += 1;
                debug!(
                    segment = id,
                    clip = %segment.clip_name,
                    frames = segment.frames_written,
                    mean,
                    baseline,
                    "Segment kept"
                );
            }
            QualityVerdict::Delete { mean, baseline } => {
                info!(
                    clip = %segment.clip_name,
                    start_frame = segment.start_frame,
                    mean,
                    baseline,
                    "Deleting blurry clip"
                );
                self.discard(&segment, "blurry");
            }
            QualityVerdict::Empty => {
                debug!(clip = %segment.clip_name, "Discarding empty segment");
                self.discard(&segment, "empty");
            }
        }
        Ok(())
    }

    /// Remove a closed segment's file and log row.
    fn discard(&mut self, segment: &TrackedSegment, reason: &'static str) {
        remove_clip_file(&segment.path);
        self.log.remove(&segment.clip_name);
        self.stats.segments_deleted += 1;
        metrics::record_segment_deleted(reason);
    }
}

fn remove_clip_file(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        warn!(path = %path.display(), "Failed to remove clip file: {e}");
    }
}
