//! Progress and status reporting.

use tracing::info;

/// Status text shown while the background model trains.
pub const STATUS_TRAINING: &str = "training background subtractor...";
/// Status text shown when cutting starts.
pub const STATUS_CUTTING: &str = "begin cutting:";
/// Status text shown when the run is complete.
pub const STATUS_DONE: &str = "Done!";

/// Frames between two progress updates.
pub const PROGRESS_EVERY: u64 = 10;

/// Receives status and progress updates from a cutting run.
///
/// The cutter behaves identically with or without an observer attached.
pub trait ProgressObserver: Send {
    fn set_status(&self, text: &str);

    /// `current` frames of `max` have been processed; `max` is 0 when unknown.
    fn set_progress(&self, current: u64, max: u64);
}

/// Observer that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn set_status(&self, _text: &str) {}

    fn set_progress(&self, _current: u64, _max: u64) {}
}

/// Observer that forwards updates to the log, one line per 10%.
#[derive(Debug, Default)]
pub struct TracingProgress {
    last_decile: std::sync::atomic::AtomicU64,
}

impl ProgressObserver for TracingProgress {
    fn set_status(&self, text: &str) {
        info!(status = text, "Cutter status");
    }

    fn set_progress(&self, current: u64, max: u64) {
        use std::sync::atomic::Ordering;

        if max == 0 {
            return;
        }
        let decile = (current.min(max) * 10) / max;
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            info!(current, max, percent = decile * 10, "Cutting progress");
        }
    }
}

impl<P: ProgressObserver + ?Sized> ProgressObserver for std::sync::Arc<P>
where
    std::sync::Arc<P>: Send,
{
    fn set_status(&self, text: &str) {
        (**self).set_status(text)
    }

    fn set_progress(&self, current: u64, max: u64) {
        (**self).set_progress(current, max)
    }
}
