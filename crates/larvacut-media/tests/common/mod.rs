//! Test doubles for driving the cutter without OpenCV.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use larvacut_media::{
    BackgroundModel, ClipSinkFactory, ClipWriter, ContourFinder, EdgeMasker, Frame, FrameSource,
    Mask, MediaError, MediaResult, Preprocessor, SharpnessScorer, SourceInfo,
};
use larvacut_models::DetectionKey;
use tokio::sync::watch;

/// A square blob drawn onto every frame in `frames`.
///
/// Before `textured_until` the blob is a checkerboard of `value` and
/// `value - 55`, afterwards it is flat.
#[derive(Debug, Clone, Copy)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub value: u8,
    pub frames: (u64, u64),
    pub textured_until: u64,
}

impl Blob {
    /// A blob visible for the whole video.
    pub fn fixed(x: u32, y: u32, size: u32, value: u8) -> Self {
        Self {
            x,
            y,
            size,
            value,
            frames: (0, u64::MAX),
            textured_until: 0,
        }
    }

    pub fn from_frame(mut self, first: u64) -> Self {
        self.frames.0 = first;
        self
    }

    pub fn textured_until(mut self, frame: u64) -> Self {
        self.textured_until = frame;
        self
    }

    fn pixel(&self, index: u64, x: u32, y: u32) -> u8 {
        if index < self.textured_until && (x + y) % 2 == 1 {
            self.value.saturating_sub(55)
        } else {
            self.value
        }
    }
}

/// Grayscale frames of a dark background with static blobs.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    total: u64,
    blobs: Vec<Blob>,
    next: u64,
    cancel: Option<(u64, watch::Sender<bool>)>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, total: u64, blobs: Vec<Blob>) -> Self {
        Self {
            width,
            height,
            total,
            blobs,
            next: 0,
            cancel: None,
        }
    }

    /// Raise `tx` once `frames` frames have been handed out.
    pub fn cancel_after(mut self, frames: u64, tx: watch::Sender<bool>) -> Self {
        self.cancel = Some((frames, tx));
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.next
    }

    fn render(&self, index: u64) -> Frame {
        let mut frame = Frame::filled(self.width, self.height, 0);
        let width = self.width as usize;
        let data = frame.data_mut();
        for blob in &self.blobs {
            if index < blob.frames.0 || index >= blob.frames.1 {
                continue;
            }
            for y in blob.y..(blob.y + blob.size).min(self.height) {
                for x in blob.x..(blob.x + blob.size).min(self.width) {
                    data[y as usize * width + x as usize] = blob.pixel(index, x, y);
                }
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            total_frames: self.total,
            fps: 30.0,
        }
    }

    fn read(&mut self) -> MediaResult<Option<Frame>> {
        if self.next >= self.total {
            return Ok(None);
        }
        let frame = self.render(self.next);
        self.next += 1;
        if let Some((after, tx)) = &self.cancel {
            if self.next >= *after {
                tx.send_replace(true);
            }
        }
        Ok(Some(frame))
    }
}

/// Foreground is every pixel brighter than the threshold.
pub struct ThresholdBackground(pub u8);

impl BackgroundModel for ThresholdBackground {
    fn apply(&mut self, frame: &Frame, _learning_rate: f64) -> MediaResult<Mask> {
        let data = frame
            .data()
            .iter()
            .map(|&v| if v > self.0 { 255 } else { 0 })
            .collect();
        Mask::from_raw(frame.width(), frame.height(), data)
    }
}

/// Edge mask that keeps everything.
pub struct AllEdges;

impl EdgeMasker for AllEdges {
    fn mask(&self, frame: &Frame) -> MediaResult<Mask> {
        let mut mask = Mask::empty(frame.width(), frame.height());
        mask.fill_rect(0, 0, frame.width(), frame.height());
        Ok(mask)
    }
}

/// Passes frames through untouched.
pub struct Unchanged;

impl Preprocessor for Unchanged {
    fn apply(&self, frame: &Frame) -> MediaResult<Frame> {
        Ok(frame.clone())
    }
}

/// Boxes of 8-connected mask regions, dropping any box that lies inside
/// another one, the way external contours skip regions nested in holes.
pub struct OuterOnly;

impl ContourFinder for OuterOnly {
    fn outer_boxes(&self, mask: &Mask) -> MediaResult<Vec<DetectionKey>> {
        let (width, height) = (mask.width(), mask.height());
        let mut seen = vec![false; width as usize * height as usize];
        let mut boxes = Vec::new();

        for start_y in 0..height {
            for start_x in 0..width {
                let start = (start_y * width + start_x) as usize;
                if seen[start] || !mask.is_set(start_x, start_y) {
                    continue;
                }
                seen[start] = true;
                let (mut x1, mut y1, mut x2, mut y2) = (start_x, start_y, start_x, start_y);
                let mut queue = VecDeque::from([(start_x, start_y)]);
                while let Some((x, y)) = queue.pop_front() {
                    x1 = x1.min(x);
                    y1 = y1.min(y);
                    x2 = x2.max(x);
                    y2 = y2.max(y);
                    for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                        for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                            let i = (ny * width + nx) as usize;
                            if !seen[i] && mask.is_set(nx, ny) {
                                seen[i] = true;
                                queue.push_back((nx, ny));
                            }
                        }
                    }
                }
                boxes.push(DetectionKey::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1));
            }
        }

        let inside = |inner: &DetectionKey, outer: &DetectionKey| {
            inner != outer
                && inner.x >= outer.x
                && inner.y >= outer.y
                && inner.x + inner.width <= outer.x + outer.width
                && inner.y + inner.height <= outer.y + outer.height
        };
        Ok(boxes
            .iter()
            .filter(|b| !boxes.iter().any(|outer| inside(b, outer)))
            .copied()
            .collect())
    }
}

/// Population variance of the region's pixels.
pub struct PixelVariance;

impl SharpnessScorer for PixelVariance {
    fn score(&self, region: &Frame) -> MediaResult<f64> {
        let data = region.data();
        if data.is_empty() {
            return Ok(0.0);
        }
        let n = data.len() as f64;
        let mean = data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        Ok(data.iter().map(|&v| (f64::from(v) - mean).powi(2)).sum::<f64>() / n)
    }
}

type ClipStore = Arc<Mutex<BTreeMap<PathBuf, Vec<Frame>>>>;

/// Clip sink keeping frames in memory and creating an empty file per clip.
#[derive(Clone, Default)]
pub struct MemorySink {
    clips: ClipStore,
    writes: Arc<AtomicU64>,
    fail_at_write: Option<u64>,
}

impl MemorySink {
    /// Fail the `n`-th write (1-based) across all clips.
    pub fn failing_at(n: u64) -> Self {
        Self {
            fail_at_write: Some(n),
            ..Default::default()
        }
    }

    /// Frames written to the clip named `name`.
    pub fn frames(&self, name: &str) -> Vec<Frame> {
        self.clips
            .lock()
            .unwrap()
            .iter()
            .find(|(path, _)| path.file_name().is_some_and(|n| n == name))
            .map(|(_, frames)| frames.clone())
            .unwrap_or_default()
    }

    pub fn opened(&self) -> usize {
        self.clips.lock().unwrap().len()
    }
}

struct MemoryWriter {
    path: PathBuf,
    clips: ClipStore,
    writes: Arc<AtomicU64>,
    fail_at_write: Option<u64>,
}

impl ClipSinkFactory for MemorySink {
    fn open(&mut self, path: &Path, _width: u32, _height: u32, _fps: f64) -> MediaResult<Box<dyn ClipWriter>> {
        std::fs::write(path, b"clip")?;
        self.clips.lock().unwrap().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            clips: self.clips.clone(),
            writes: self.writes.clone(),
            fail_at_write: self.fail_at_write,
        }))
    }
}

impl ClipWriter for MemoryWriter {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at_write == Some(n) {
            return Err(MediaError::encode_failed("disk full"));
        }
        self.clips
            .lock()
            .unwrap()
            .entry(self.path.clone())
            .or_default()
            .push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        Ok(())
    }
}

/// Clip names listed in `log.csv`.
pub fn logged_clips(dir: &Path) -> BTreeSet<String> {
    let csv = std::fs::read_to_string(dir.join("log.csv")).unwrap();
    csv.lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap().to_string())
        .collect()
}

/// Clip files present in `dir`.
pub fn clip_files(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".avi"))
        .collect()
}
