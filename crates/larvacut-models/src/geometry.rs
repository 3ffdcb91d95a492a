//! Detection geometry in frame-pixel coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bounding box of a blob at the moment it was first observed.
///
/// Used as the identity of a tracked fish for the lifetime of one clip.
/// Two detections are the same fish only if all four fields match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetectionKey {
    /// Left edge x-coordinate
    pub x: u32,
    /// Top edge y-coordinate
    pub y: u32,
    /// Box width
    pub width: u32,
    /// Box height
    pub height: u32,
}

impl DetectionKey {
    /// Create a new detection key.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Integer center of the box.
    #[inline]
    pub fn centroid(&self) -> Centroid {
        Centroid::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Right edge x-coordinate (exclusive).
    #[inline]
    pub fn x2(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate (exclusive).
    #[inline]
    pub fn y2(&self) -> u32 {
        self.y + self.height
    }
}

impl fmt::Display for DetectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Integer pixel center of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Centroid {
    pub cx: u32,
    pub cy: u32,
}

impl Centroid {
    pub fn new(cx: u32, cy: u32) -> Self {
        Self { cx, cy }
    }
}

impl fmt::Display for Centroid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cx, self.cy)
    }
}

/// Fixed-size crop window, half-open on the upper bounds.
///
/// Every window produced by the crop geometry satisfies
/// `x2 - x1 == y2 - y1 == 2 * padding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x1: u32,
    pub x2: u32,
    pub y1: u32,
    pub y2: u32,
}

impl CropWindow {
    /// Window width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    /// Window height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Whether the window lies fully inside a `frame_width x frame_height` frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2 && self.x2 <= frame_width && self.y2 <= frame_height
    }
}
