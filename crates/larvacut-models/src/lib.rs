//! Shared data models for larvacut.
//!
//! This crate provides Serde-serializable types for:
//! - The cutter configuration bundle and its validation
//! - Detection geometry (detection keys, centroids, crop windows)
//! - Metadata log rows

pub mod config;
pub mod geometry;
pub mod log_entry;

// Re-export common types
pub use config::{ConfigError, CutterConfig};
pub use geometry::{Centroid, CropWindow, DetectionKey};
pub use log_entry::LogEntry;
