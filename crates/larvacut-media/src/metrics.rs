//! Run counters.
//!
//! Recorded through the `metrics` facade; they are no-ops unless the host
//! process installs a recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_OPENED_TOTAL: &str = "larvacut_segments_opened_total";
    pub const SEGMENTS_DELETED_TOTAL: &str = "larvacut_segments_deleted_total";
    pub const FRAMES_PROCESSED_TOTAL: &str = "larvacut_frames_processed_total";
}

/// Record a newly opened segment.
pub fn record_segment_opened() {
    counter!(names::SEGMENTS_OPENED_TOTAL).increment(1);
}

/// Record a removed segment; `reason` is `blurry`, `empty` or `aborted`.
pub fn record_segment_deleted(reason: &'static str) {
    let labels = [("reason", reason)];
    counter!(names::SEGMENTS_DELETED_TOTAL, &labels).increment(1);
}

/// Record one processed frame.
pub fn record_frame_processed() {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
}
