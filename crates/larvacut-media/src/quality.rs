//! Sharpness scoring and the online blurry-clip filter.
//!
//! Sharpness is the variance of the Laplacian of a grayscale region, a
//! standard focus proxy: higher means sharper.

use serde::Serialize;

use crate::error::MediaResult;
use crate::frame::Frame;

/// Scores the sharpness of a grayscale region; higher is sharper.
pub trait SharpnessScorer: Send {
    fn score(&self, region: &Frame) -> MediaResult<f64>;
}

#[cfg(feature = "opencv")]
pub use self::opencv_scorer::LaplacianVariance;

#[cfg(feature = "opencv")]
mod opencv_scorer {
    use opencv::{
        core::{self, Mat, BORDER_DEFAULT, CV_64F},
        imgproc,
        prelude::*,
    };

    use super::SharpnessScorer;
    use crate::cv::frame_to_mat;
    use crate::error::{MediaError, MediaResult};
    use crate::frame::Frame;

    /// Variance of the 3x3 Laplacian (`[0 1 0; 1 -4 1; 0 1 0]`) in 64-bit
    /// float, reflect-101 borders. Empty regions score 0.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LaplacianVariance;

    impl SharpnessScorer for LaplacianVariance {
        fn score(&self, region: &Frame) -> MediaResult<f64> {
            if region.is_empty() {
                return Ok(0.0);
            }
            let src = frame_to_mat(region)?;
            let mut laplacian = Mat::default();
            imgproc::laplacian(&src, &mut laplacian, CV_64F, 1, 1.0, 0.0, BORDER_DEFAULT)
                .map_err(|e| MediaError::internal(format!("laplacian: {e}")))?;

            let mut mean = Mat::default();
            let mut stddev = Mat::default();
            core::mean_std_dev(&laplacian, &mut mean, &mut stddev, &core::no_array())
                .map_err(|e| MediaError::internal(format!("laplacian stddev: {e}")))?;
            let sigma = *stddev
                .at::<f64>(0)
                .map_err(|e| MediaError::internal(format!("laplacian stddev: {e}")))?;
            Ok(sigma * sigma)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_uniform_region_has_zero_variance() {
            let scorer = LaplacianVariance;
            assert_eq!(scorer.score(&Frame::filled(16, 16, 200)).unwrap(), 0.0);
            assert_eq!(scorer.score(&Frame::filled(0, 0, 0)).unwrap(), 0.0);
        }

        #[test]
        fn test_single_bright_pixel() {
            // -4v at the center, v at the four neighbours, 0 elsewhere
            let mut data = vec![0u8; 25];
            data[12] = 10;
            let variance = LaplacianVariance
                .score(&Frame::from_gray(5, 5, data).unwrap())
                .unwrap();
            assert!((variance - 2000.0 / 25.0).abs() < 1e-6, "got {variance}");
        }

        #[test]
        fn test_sharp_edges_score_higher_than_soft_ones() {
            let sharp: Vec<u8> = (0..64).map(|i| if (i % 8) < 4 { 0 } else { 255 }).collect();
            let soft: Vec<u8> = (0..64).map(|i| ((i % 8) * 30) as u8).collect();
            let sharp = LaplacianVariance.score(&Frame::from_gray(8, 8, sharp).unwrap()).unwrap();
            let soft = LaplacianVariance.score(&Frame::from_gray(8, 8, soft).unwrap()).unwrap();
            assert!(sharp > soft, "sharp {sharp} should exceed soft {soft}");
        }
    }
}

/// Outcome of evaluating a closed segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum QualityVerdict {
    /// Sharp enough relative to the running mean.
    Keep { mean: f64, baseline: f64 },
    /// More than the allowed drop below the running mean.
    Delete { mean: f64, baseline: f64 },
    /// No frames were written; nothing to score.
    Empty,
}

impl QualityVerdict {
    pub fn should_delete(&self) -> bool {
        !matches!(self, QualityVerdict::Keep { .. })
    }
}

/// Online, order-dependent deletion heuristic.
///
/// Every closed segment contributes its mean score to the running statistic
/// before being compared against the mean of all recorded segment means,
/// itself included. Earlier verdicts are never revisited.
#[derive(Debug, Clone)]
pub struct QualityFilter {
    drop_threshold: f64,
    means: Vec<f64>,
}

impl QualityFilter {
    /// Create a filter deleting segments more than `drop_threshold` below the running mean.
    pub fn new(drop_threshold: f64) -> Self {
        Self {
            drop_threshold,
            means: Vec::new(),
        }
    }

    /// Record a closed segment's samples and decide its fate.
    pub fn evaluate(&mut self, scores: &[f64]) -> QualityVerdict {
        if scores.is_empty() {
            return QualityVerdict::Empty;
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        self.means.push(mean);
        let baseline = self.means.iter().sum::<f64>() / self.means.len() as f64;

        if mean < baseline - self.drop_threshold {
            QualityVerdict::Delete { mean, baseline }
        } else {
            QualityVerdict::Keep { mean, baseline }
        }
    }

    /// Segment means recorded so far, in closing order.
    pub fn recorded(&self) -> &[f64] {
        &self.means
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_segment_is_always_kept() {
        let mut filter = QualityFilter::new(1.5);
        assert!(!filter.evaluate(&[0.1, 0.2]).should_delete());
    }

    #[test]
    fn test_blurry_segment_below_running_mean_is_deleted() {
        let mut filter = QualityFilter::new(1.5);
        filter.evaluate(&[50.0]);
        filter.evaluate(&[52.0]);
        let verdict = filter.evaluate(&[10.0]);
        match verdict {
            QualityVerdict::Delete { mean, baseline } => {
                assert_eq!(mean, 10.0);
                assert!((baseline - 112.0 / 3.0).abs() < 1e-9);
            }
            other => panic!("expected delete, got {other:?}"),
        }
        assert_eq!(filter.recorded().len(), 3);
    }

    #[test]
    fn test_order_dependence_is_preserved() {
        // A blurry segment first is kept; the same segment later is deleted.
        let mut early = QualityFilter::new(1.5);
        assert!(!early.evaluate(&[10.0]).should_delete());
        early.evaluate(&[50.0]);

        let mut late = QualityFilter::new(1.5);
        late.evaluate(&[50.0]);
        assert!(late.evaluate(&[10.0]).should_delete());
    }

    #[test]
    fn test_empty_segment_does_not_touch_statistic() {
        let mut filter = QualityFilter::new(1.5);
        assert_eq!(filter.evaluate(&[]), QualityVerdict::Empty);
        assert!(filter.recorded().is_empty());
    }
}
