//! Metadata log rows.

use serde::{Deserialize, Serialize};

use crate::geometry::Centroid;

/// One row of the metadata log, describing a clip cut from a parent video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Clip file name inside the output folder
    pub movie_name: String,
    /// Path of the video the clip was cut from
    pub parent_video: String,
    /// Index of the clip's first frame in the parent video
    pub frame: u64,
    /// Detection centroid in parent-video coordinates
    pub coordinates: Centroid,
    /// Free-text comment
    #[serde(default)]
    pub comments: String,
    /// Label placeholder, filled in by the labeling tools
    #[serde(default)]
    pub label: Option<String>,
}

impl LogEntry {
    /// Create an unlabeled entry with an empty comment.
    pub fn new(
        movie_name: impl Into<String>,
        parent_video: impl Into<String>,
        frame: u64,
        coordinates: Centroid,
    ) -> Self {
        Self {
            movie_name: movie_name.into(),
            parent_video: parent_video.into(),
            frame,
            coordinates,
            comments: String::new(),
            label: None,
        }
    }
}
