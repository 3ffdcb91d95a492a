//! Conversions between owned frame buffers and OpenCV matrices.

use opencv::{
    core::{AlgorithmHint, Mat, Scalar, CV_8U, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, Mask};

/// Copy a frame into a freshly allocated single channel matrix.
pub(crate) fn frame_to_mat(frame: &Frame) -> MediaResult<Mat> {
    bytes_to_mat(frame.width(), frame.height(), frame.data())
}

/// Copy a mask into a single channel matrix.
pub(crate) fn mask_to_mat(mask: &Mask) -> MediaResult<Mat> {
    bytes_to_mat(mask.width(), mask.height(), mask.data())
}

fn bytes_to_mat(width: u32, height: u32, data: &[u8]) -> MediaResult<Mat> {
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC1, Scalar::all(0.0))
            .map_err(|e| MediaError::internal(format!("mat alloc: {e}")))?;
    let dst = mat
        .data_bytes_mut()
        .map_err(|e| MediaError::internal(format!("mat data: {e}")))?;
    dst.copy_from_slice(data);
    Ok(mat)
}

/// Copy an 8-bit matrix into a grayscale frame, converting BGR/BGRA input.
pub(crate) fn mat_to_frame(mat: &Mat) -> MediaResult<Frame> {
    if mat.depth() != CV_8U {
        return Err(MediaError::UnsupportedFormat(format!(
            "matrix type {}",
            mat.typ()
        )));
    }
    let code = match mat.channels() {
        1 => None,
        3 => Some(imgproc::COLOR_BGR2GRAY),
        4 => Some(imgproc::COLOR_BGRA2GRAY),
        channels => {
            return Err(MediaError::UnsupportedFormat(format!(
                "{channels}-channel frames"
            )))
        }
    };

    let data = match code {
        None => continuous_bytes(mat)?,
        Some(code) => {
            let mut gray = Mat::default();
            imgproc::cvt_color(mat, &mut gray, code, 0, AlgorithmHint::ALGO_HINT_DEFAULT)
                .map_err(|e| MediaError::decode_failed(format!("bgr2gray: {e}")))?;
            continuous_bytes(&gray)?
        }
    };
    Frame::from_gray(mat.cols() as u32, mat.rows() as u32, data)
}

/// Copy a single channel matrix into a mask.
pub(crate) fn mat_to_mask(mat: &Mat) -> MediaResult<Mask> {
    if mat.typ() != CV_8UC1 {
        return Err(MediaError::detection_failed(format!(
            "expected single channel mask, got type {}",
            mat.typ()
        )));
    }
    let data = continuous_bytes(mat)?;
    Mask::from_raw(mat.cols() as u32, mat.rows() as u32, data)
}

/// Copy a single channel matrix into a grayscale frame.
pub(crate) fn mat_to_gray(mat: &Mat) -> MediaResult<Frame> {
    if mat.typ() != CV_8UC1 {
        return Err(MediaError::internal(format!(
            "expected single channel image, got type {}",
            mat.typ()
        )));
    }
    let data = continuous_bytes(mat)?;
    Frame::from_gray(mat.cols() as u32, mat.rows() as u32, data)
}

fn continuous_bytes(mat: &Mat) -> MediaResult<Vec<u8>> {
    if mat.is_continuous() {
        return mat
            .data_bytes()
            .map(<[u8]>::to_vec)
            .map_err(|e| MediaError::internal(format!("mat data: {e}")));
    }
    let owned = mat
        .try_clone()
        .map_err(|e| MediaError::internal(format!("mat clone: {e}")))?;
    owned
        .data_bytes()
        .map(<[u8]>::to_vec)
        .map_err(|e| MediaError::internal(format!("mat data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_matrix_becomes_gray_frame() {
        let bgr = Mat::new_rows_cols_with_default(2, 3, opencv::core::CV_8UC3, Scalar::new(255.0, 0.0, 0.0, 0.0))
            .unwrap();
        let frame = mat_to_frame(&bgr).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        // pure blue in BT.601
        assert!(frame.data().iter().all(|&v| v == 29));
    }

    #[test]
    fn test_gray_round_trip_keeps_pixels() {
        let frame = Frame::from_gray(3, 2, vec![0, 10, 20, 30, 40, 50]).unwrap();
        let mat = frame_to_mat(&frame).unwrap();
        assert_eq!(mat_to_frame(&mat).unwrap(), frame);
    }
}
