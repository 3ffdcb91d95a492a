//! OpenCV implementations of the detection stages.

use larvacut_models::{CutterConfig, DetectionKey};
use opencv::{
    core::{self, AlgorithmHint, Mat, Point, Ptr, Size, Vector, BORDER_CONSTANT, BORDER_DEFAULT},
    imgproc,
    prelude::*,
    video,
};

use super::blob::ContourFinder;
use super::foreground::{BackgroundModel, EdgeMasker, Preprocessor};
use crate::cv::{frame_to_mat, mask_to_mat, mat_to_gray, mat_to_mask};
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, Mask};

/// Default MOG2 variance threshold.
const MOG2_VAR_THRESHOLD: f64 = 16.0;
/// Blur applied before edge detection to wash out sensor noise.
const EDGE_BLUR_KERNEL: i32 = 71;
/// Canny hysteresis thresholds.
const CANNY_LOW: f64 = 10.0;
const CANNY_HIGH: f64 = 10.0;
/// Side of the elliptical structuring element.
const MORPH_KERNEL: i32 = 10;
const DILATE_ITERATIONS: i32 = 2;

/// Gaussian-mixture background model with shadow detection.
pub struct Mog2Background {
    subtractor: Ptr<video::BackgroundSubtractorMOG2>,
    fg_mask: Mat,
}

impl Mog2Background {
    /// Create a model remembering the last `history` frames.
    pub fn new(history: u64) -> MediaResult<Self> {
        let history = i32::try_from(history.max(1)).unwrap_or(i32::MAX);
        let subtractor = video::create_background_subtractor_mog2(history, MOG2_VAR_THRESHOLD, true)
            .map_err(|e| MediaError::detection_failed(format!("mog2 create: {e}")))?;
        Ok(Self {
            subtractor,
            fg_mask: Mat::default(),
        })
    }
}

impl BackgroundModel for Mog2Background {
    fn apply(&mut self, frame: &Frame, learning_rate: f64) -> MediaResult<Mask> {
        let input = frame_to_mat(frame)?;
        self.subtractor
            .apply(&input, &mut self.fg_mask, learning_rate)
            .map_err(|e| MediaError::detection_failed(format!("mog2 apply: {e}")))?;
        mat_to_mask(&self.fg_mask)
    }
}

/// Blur, Canny, then close/open/dilate with an elliptical kernel.
pub struct CannyEdgeMasker {
    kernel: Mat,
}

impl CannyEdgeMasker {
    pub fn new() -> MediaResult<Self> {
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(MORPH_KERNEL, MORPH_KERNEL),
            Point::new(-1, -1),
        )
        .map_err(|e| MediaError::detection_failed(format!("edge kernel: {e}")))?;
        Ok(Self { kernel })
    }

    fn morph(&self, src: &Mat, op: i32, iterations: i32, stage: &str) -> MediaResult<Mat> {
        let border_value = imgproc::morphology_default_border_value()
            .map_err(|e| MediaError::detection_failed(format!("{stage}: {e}")))?;
        let mut dst = Mat::default();
        imgproc::morphology_ex(
            src,
            &mut dst,
            op,
            &self.kernel,
            Point::new(-1, -1),
            iterations,
            BORDER_CONSTANT,
            border_value,
        )
        .map_err(|e| MediaError::detection_failed(format!("{stage}: {e}")))?;
        Ok(dst)
    }
}

impl EdgeMasker for CannyEdgeMasker {
    fn mask(&self, frame: &Frame) -> MediaResult<Mask> {
        let gray = frame_to_mat(frame)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            &gray,
            &mut blurred,
            Size::new(EDGE_BLUR_KERNEL, EDGE_BLUR_KERNEL),
            0.0,
            0.0,
            BORDER_DEFAULT,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| MediaError::detection_failed(format!("edge blur: {e}")))?;

        let mut edges = Mat::default();
        imgproc::canny(&blurred, &mut edges, CANNY_LOW, CANNY_HIGH, 3, false)
            .map_err(|e| MediaError::detection_failed(format!("canny: {e}")))?;

        let closed = self.morph(&edges, imgproc::MORPH_CLOSE, 1, "edge close")?;
        let opened = self.morph(&closed, imgproc::MORPH_OPEN, 1, "edge open")?;
        let dilated = self.morph(&opened, imgproc::MORPH_DILATE, DILATE_ITERATIONS, "edge dilate")?;

        mat_to_mask(&dilated)
    }
}

/// Optional Gaussian blur followed by an additive brightness lift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenCvPreprocess {
    /// Odd kernel size, `None` to skip blurring.
    pub blur_kernel: Option<u32>,
    /// Added to every pixel, saturating at 255.
    pub brighten: u8,
}

impl OpenCvPreprocess {
    pub fn from_config(config: &CutterConfig) -> Self {
        Self {
            blur_kernel: config.blur_kernel(),
            brighten: config.brighten,
        }
    }
}

impl Preprocessor for OpenCvPreprocess {
    fn apply(&self, frame: &Frame) -> MediaResult<Frame> {
        let mut image = frame_to_mat(frame)?;

        if let Some(kernel) = self.blur_kernel.filter(|&k| k > 1) {
            let side = i32::try_from(kernel)
                .map_err(|_| MediaError::detection_failed(format!("blur kernel {kernel} too large")))?;
            let mut blurred = Mat::default();
            imgproc::gaussian_blur(
                &image,
                &mut blurred,
                Size::new(side, side),
                0.0,
                0.0,
                BORDER_DEFAULT,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )
            .map_err(|e| MediaError::detection_failed(format!("preprocess blur: {e}")))?;
            image = blurred;
        }

        if self.brighten > 0 {
            let mut lifted = Mat::default();
            core::convert_scale_abs(&image, &mut lifted, 1.0, f64::from(self.brighten))
                .map_err(|e| MediaError::detection_failed(format!("preprocess brighten: {e}")))?;
            image = lifted;
        }

        mat_to_gray(&image)
    }
}

/// Bounding boxes of the outermost contours (`RETR_EXTERNAL`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OuterContours;

impl ContourFinder for OuterContours {
    fn outer_boxes(&self, mask: &Mask) -> MediaResult<Vec<DetectionKey>> {
        let image = mask_to_mat(mask)?;
        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            &image,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_TC89_L1,
            Point::new(0, 0),
        )
        .map_err(|e| MediaError::detection_failed(format!("find contours: {e}")))?;

        let mut boxes = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let rect = imgproc::bounding_rect(&contour)
                .map_err(|e| MediaError::detection_failed(format!("bounding rect: {e}")))?;
            boxes.push(DetectionKey::new(
                rect.x.max(0) as u32,
                rect.y.max(0) as u32,
                rect.width.max(0) as u32,
                rect.height.max(0) as u32,
            ));
        }
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_inside_a_hole_is_not_reported() {
        let mut mask = Mask::empty(240, 240);
        mask.fill_rect(10, 10, 200, 200);
        let mut data = mask.data().to_vec();
        for y in 30..190usize {
            data[y * 240 + 30..y * 240 + 190].fill(0);
        }
        let mut mask = Mask::from_raw(240, 240, data).unwrap();
        mask.fill_rect(60, 60, 100, 100);

        let boxes = OuterContours.outer_boxes(&mask).unwrap();
        assert_eq!(boxes, vec![DetectionKey::new(10, 10, 200, 200)]);
    }

    #[test]
    fn test_separate_regions_each_get_a_box() {
        let mut mask = Mask::empty(100, 100);
        mask.fill_rect(5, 5, 10, 20);
        mask.fill_rect(50, 60, 30, 10);
        let mut boxes = OuterContours.outer_boxes(&mask).unwrap();
        boxes.sort();
        assert_eq!(
            boxes,
            vec![DetectionKey::new(5, 5, 10, 20), DetectionKey::new(50, 60, 30, 10)]
        );
    }

    #[test]
    fn test_preprocess_brightens_with_saturation() {
        let preprocess = OpenCvPreprocess {
            blur_kernel: None,
            brighten: 50,
        };
        let frame = Frame::from_gray(2, 1, vec![10, 250]).unwrap();
        assert_eq!(preprocess.apply(&frame).unwrap().data(), &[60, 255]);
    }

    #[test]
    fn test_preprocess_blur_keeps_flat_frames() {
        let preprocess = OpenCvPreprocess {
            blur_kernel: Some(5),
            brighten: 0,
        };
        let frame = Frame::filled(9, 5, 77);
        assert_eq!(preprocess.apply(&frame).unwrap(), frame);
    }
}
