//! Cutter configuration bundle.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default half side length of the crop window.
pub const DEFAULT_PADDING: u32 = 250;
/// Default clip frame rate.
pub const DEFAULT_FPS_OUT: f64 = 30.0;
/// Default minimum blob width and height.
pub const DEFAULT_MIN_BLOB_SIZE: u32 = 70;
/// Default additive brightness applied before background subtraction.
pub const DEFAULT_BRIGHTEN: u8 = 50;
/// Default number of frames per clip.
pub const DEFAULT_TARGET_LENGTH: u32 = 100;
/// Default rescan cadence as a fraction of the clip length.
pub const DEFAULT_RESCAN_FRACTION: f64 = 0.8;
/// Default number of background training frames.
pub const DEFAULT_TRAINING_FRAMES: u32 = 500;
/// Default quality drop below the running mean that deletes a clip.
pub const DEFAULT_QUALITY_DROP: f64 = 1.5;
/// Default clip container extension.
pub const DEFAULT_CLIP_EXTENSION: &str = "avi";

/// Configuration for one cutting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterConfig {
    /// Half side length of the square crop window (default: 250)
    pub padding: u32,
    /// Frame rate of the written clips (default: 30.0)
    pub fps_out: f64,
    /// Minimum blob width; blobs wider than 10x this are rejected too (default: 70)
    pub min_width: u32,
    /// Minimum blob height; blobs taller than 10x this are rejected too (default: 70)
    pub min_height: u32,
    /// Additive brightness before background subtraction, 0 disables (default: 50)
    pub brighten: u8,
    /// Also brighten the frames written into clips (default: false)
    pub apply_brightness: bool,
    /// Preprocessing Gaussian blur kernel, 0 disables, even values are bumped to odd (default: 0)
    pub blur: u32,
    /// Frames per clip; a clip closes after `target_length + 1` written frames (default: 100)
    pub target_length: u32,
    /// Rescan every `round(rescan_fraction * target_length)` frames (default: 0.8)
    pub rescan_fraction: f64,
    /// Frames used to train the background model; 0 skips training (default: 500)
    pub training_frame_count: u32,
    /// A clip whose mean sharpness is this far below the running mean is deleted (default: 1.5)
    pub quality_drop: f64,
    /// Container extension of the written clips (default: "avi")
    pub clip_extension: String,
}

impl Default for CutterConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            fps_out: DEFAULT_FPS_OUT,
            min_width: DEFAULT_MIN_BLOB_SIZE,
            min_height: DEFAULT_MIN_BLOB_SIZE,
            brighten: DEFAULT_BRIGHTEN,
            apply_brightness: false,
            blur: 0,
            target_length: DEFAULT_TARGET_LENGTH,
            rescan_fraction: DEFAULT_RESCAN_FRACTION,
            training_frame_count: DEFAULT_TRAINING_FRAMES,
            quality_drop: DEFAULT_QUALITY_DROP,
            clip_extension: DEFAULT_CLIP_EXTENSION.to_string(),
        }
    }
}

impl CutterConfig {
    /// Create config from `LARVACUT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            padding: env_or("LARVACUT_PADDING", defaults.padding),
            fps_out: env_or("LARVACUT_FPS_OUT", defaults.fps_out),
            min_width: env_or("LARVACUT_MIN_WIDTH", defaults.min_width),
            min_height: env_or("LARVACUT_MIN_HEIGHT", defaults.min_height),
            brighten: env_or("LARVACUT_BRIGHTEN", defaults.brighten),
            apply_brightness: env_or("LARVACUT_APPLY_BRIGHTNESS", defaults.apply_brightness),
            blur: env_or("LARVACUT_BLUR", defaults.blur),
            target_length: env_or("LARVACUT_TARGET_LENGTH", defaults.target_length),
            rescan_fraction: env_or("LARVACUT_RESCAN_FRACTION", defaults.rescan_fraction),
            training_frame_count: env_or("LARVACUT_TRAINING_FRAMES", defaults.training_frame_count),
            quality_drop: env_or("LARVACUT_QUALITY_DROP", defaults.quality_drop),
            clip_extension: std::env::var("LARVACUT_CLIP_EXTENSION")
                .unwrap_or(defaults.clip_extension),
        }
    }

    /// Check the values that do not depend on the input video.
    ///
    /// Every `training_frame_count` is accepted: 0 starts detecting on the
    /// first frame with an untrained background model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.padding == 0 {
            return Err(ConfigError::ZeroPadding);
        }
        if self.target_length == 0 {
            return Err(ConfigError::ZeroTargetLength);
        }
        if !(self.rescan_fraction > 0.0 && self.rescan_fraction <= 1.0) {
            return Err(ConfigError::RescanFraction(self.rescan_fraction));
        }
        if !(self.fps_out.is_finite() && self.fps_out > 0.0) {
            return Err(ConfigError::FrameRate(self.fps_out));
        }
        if self.min_width == 0 || self.min_height == 0 {
            return Err(ConfigError::ZeroBlobSize);
        }
        if !(self.quality_drop.is_finite() && self.quality_drop >= 0.0) {
            return Err(ConfigError::QualityDrop(self.quality_drop));
        }
        if self.clip_extension.trim_matches('.').is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        Ok(())
    }

    /// Check that the crop window fits a `frame_width x frame_height` frame.
    pub fn validate_for_frame(&self, frame_width: u32, frame_height: u32) -> Result<(), ConfigError> {
        self.validate()?;
        let side = self.crop_side();
        if u64::from(frame_width) < side || u64::from(frame_height) < side {
            return Err(ConfigError::CropLargerThanFrame {
                side,
                frame_width,
                frame_height,
            });
        }
        Ok(())
    }

    /// Side length of the square crop window.
    #[inline]
    pub fn crop_side(&self) -> u64 {
        2 * u64::from(self.padding)
    }

    /// Number of written frames after which a clip closes.
    #[inline]
    pub fn frames_per_clip(&self) -> u64 {
        u64::from(self.target_length) + 1
    }

    /// Frames between two detection scans, never less than one.
    pub fn rescan_interval(&self) -> u64 {
        let interval = (self.rescan_fraction * f64::from(self.target_length)).round();
        (interval as u64).max(1)
    }

    /// Odd Gaussian kernel size for preprocessing, `None` when blurring is disabled.
    pub fn blur_kernel(&self) -> Option<u32> {
        match self.blur {
            0 => None,
            k if k % 2 == 0 => Some(k + 1),
            k => Some(k),
        }
    }

    /// Number of training frames for a video of `total_frames` frames.
    ///
    /// The lesser of the configured count and a quarter of the video. An
    /// unknown length (0) keeps the configured count; training stops early if
    /// the source runs out.
    pub fn training_frames(&self, total_frames: u64) -> u64 {
        let configured = u64::from(self.training_frame_count);
        if total_frames == 0 {
            return configured;
        }
        let quarter = (total_frames as f64 / 4.0).round() as u64;
        configured.min(quarter)
    }

    /// Normalized extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.clip_extension.trim_start_matches('.')
    }
}

impl fmt::Display for CutterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Padding {}; FPS {}; Brighten {}; Blur {}; Minimum Width {}; Minimum Height {}; \
             Clip Length {}; Rescan Fraction {}; Training Frames {}; Quality Drop {}; \
             Apply Brightness {}",
            self.padding,
            self.fps_out,
            self.brighten,
            self.blur_kernel().unwrap_or(0),
            self.min_width,
            self.min_height,
            self.target_length,
            self.rescan_fraction,
            self.training_frame_count,
            self.quality_drop,
            self.apply_brightness
        )
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Configuration rejected before any frame is read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("padding must be greater than zero")]
    ZeroPadding,

    #[error("target clip length must be greater than zero")]
    ZeroTargetLength,

    #[error("rescan fraction must be in (0, 1], got {0}")]
    RescanFraction(f64),

    #[error("output frame rate must be positive, got {0}")]
    FrameRate(f64),

    #[error("minimum blob width and height must be greater than zero")]
    ZeroBlobSize,

    #[error("quality drop must be a non-negative number, got {0}")]
    QualityDrop(f64),

    #[error("clip extension must not be empty")]
    EmptyExtension,

    #[error("crop window of {side}px does not fit a {frame_width}x{frame_height} frame")]
    CropLargerThanFrame {
        side: u64,
        frame_width: u32,
        frame_height: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CutterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rescan_interval_rounds_fraction_of_target() {
        let config = CutterConfig::default();
        assert_eq!(config.rescan_interval(), 80);

        let config = CutterConfig {
            target_length: 1,
            rescan_fraction: 0.3,
            ..Default::default()
        };
        assert_eq!(config.rescan_interval(), 1, "interval never drops to zero");
    }

    #[test]
    fn test_blur_kernel_is_forced_odd() {
        let mut config = CutterConfig::default();
        assert_eq!(config.blur_kernel(), None);
        config.blur = 4;
        assert_eq!(config.blur_kernel(), Some(5));
        config.blur = 7;
        assert_eq!(config.blur_kernel(), Some(7));
    }

    #[test]
    fn test_training_frames_capped_by_quarter_of_video() {
        let config = CutterConfig::default();
        assert_eq!(config.training_frames(10_000), 500);
        assert_eq!(config.training_frames(1000), 250);
        assert_eq!(config.training_frames(0), 500);
    }

    #[test]
    fn test_zero_training_frames_skips_training() {
        let config = CutterConfig {
            training_frame_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.training_frames(1000), 0);
        assert_eq!(config.training_frames(0), 0);
    }

    #[test]
    fn test_rejects_crop_larger_than_frame() {
        let config = CutterConfig {
            padding: 300,
            ..Default::default()
        };
        assert!(config.validate_for_frame(600, 600).is_ok());
        assert_eq!(
            config.validate_for_frame(640, 480),
            Err(ConfigError::CropLargerThanFrame {
                side: 600,
                frame_width: 640,
                frame_height: 480
            })
        );
    }

    #[test]
    fn test_rejects_nonsensical_values() {
        let cases = [
            CutterConfig {
                target_length: 0,
                ..Default::default()
            },
            CutterConfig {
                padding: 0,
                ..Default::default()
            },
            CutterConfig {
                rescan_fraction: 1.5,
                ..Default::default()
            },
            CutterConfig {
                rescan_fraction: 0.0,
                ..Default::default()
            },
            CutterConfig {
                fps_out: f64::NAN,
                ..Default::default()
            },
            CutterConfig {
                quality_drop: -1.0,
                ..Default::default()
            },
            CutterConfig {
                clip_extension: ".".to_string(),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CutterConfig =
            serde_json::from_str(r#"{"padding": 64, "target_length": 20}"#).unwrap();
        assert_eq!(config.padding, 64);
        assert_eq!(config.target_length, 20);
        assert_eq!(config.min_width, DEFAULT_MIN_BLOB_SIZE);
        assert_eq!(config.extension(), "avi");
    }

    #[test]
    fn test_profile_dump_mentions_clip_length() {
        let dump = CutterConfig::default().to_string();
        assert!(dump.contains("Clip Length 100"));
        assert!(dump.contains("Brighten 50"));
    }
}
