//! Blob extraction: outer contours of the foreground mask, filtered by size.

use larvacut_models::{Centroid, DetectionKey};
use serde::Serialize;

use crate::error::MediaResult;
use crate::frame::Mask;

/// Largest accepted blob side, as a multiple of the minimum.
pub const MAX_SIZE_FACTOR: u32 = 10;

/// A blob that passed the size filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub key: DetectionKey,
    pub centroid: Centroid,
}

/// Finds the outer boundaries of the foreground regions of a mask.
///
/// Only outermost contours are reported: a region lying inside the hole of
/// another region does not get a box of its own.
pub trait ContourFinder: Send {
    /// Bounding box of every outer contour.
    fn outer_boxes(&self, mask: &Mask) -> MediaResult<Vec<DetectionKey>>;
}

/// Turns a foreground mask into size-filtered bounding boxes.
pub struct BlobExtractor<C> {
    contours: C,
    min_width: u32,
    min_height: u32,
}

impl<C: ContourFinder> BlobExtractor<C> {
    pub fn new(contours: C, min_width: u32, min_height: u32) -> Self {
        Self {
            contours,
            min_width,
            min_height,
        }
    }

    /// Whether a `width x height` box is a plausible larva.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        (self.min_width..=self.min_width.saturating_mul(MAX_SIZE_FACTOR)).contains(&width)
            && (self.min_height..=self.min_height.saturating_mul(MAX_SIZE_FACTOR)).contains(&height)
    }

    /// Outer regions that pass the size filter, ordered by the top-left
    /// corner of their box (row first, then column).
    pub fn extract(&self, mask: &Mask) -> MediaResult<Vec<Detection>> {
        let mut keys: Vec<DetectionKey> = self
            .contours
            .outer_boxes(mask)?
            .into_iter()
            .filter(|key| self.accepts(key.width, key.height))
            .collect();
        keys.sort_by_key(|key| (key.y, key.x, key.width, key.height));
        keys.dedup();

        Ok(keys
            .into_iter()
            .map(|key| Detection {
                key,
                centroid: key.centroid(),
            })
            .collect())
    }
}
