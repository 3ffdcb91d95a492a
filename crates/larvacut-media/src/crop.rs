//! Fixed-size crop windows around a detection centroid.

use larvacut_models::{Centroid, ConfigError, CropWindow};

/// Square window of side `2 * padding` centred on `centroid`, shifted (never
/// shrunk) so that it lies inside a `frame_width x frame_height` frame.
///
/// Fails when the window cannot fit the frame at all; the cutter checks this
/// once before reading any frame, so the tracker never sees the error.
pub fn crop_window(
    centroid: Centroid,
    padding: u32,
    frame_width: u32,
    frame_height: u32,
) -> Result<CropWindow, ConfigError> {
    let side = 2 * i64::from(padding);
    if side > i64::from(frame_width) || side > i64::from(frame_height) {
        return Err(ConfigError::CropLargerThanFrame {
            side: side as u64,
            frame_width,
            frame_height,
        });
    }

    let (x1, x2) = clamp_axis(i64::from(centroid.cx), i64::from(padding), i64::from(frame_width));
    let (y1, y2) = clamp_axis(i64::from(centroid.cy), i64::from(padding), i64::from(frame_height));
    Ok(CropWindow { x1, x2, y1, y2 })
}

fn clamp_axis(center: i64, padding: i64, limit: i64) -> (u32, u32) {
    let mut low = center - padding;
    let mut high = center + padding;
    if low < 0 {
        high -= low;
        low = 0;
    }
    if high > limit {
        low -= high - limit;
        high = limit;
    }
    (low as u32, high as u32)
}
