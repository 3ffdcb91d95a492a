//! Owned frame and mask buffers.
//!
//! Frames are tightly packed 8-bit grayscale images; sources convert color
//! input when they decode it. Masks are single channel; any nonzero pixel is
//! foreground.

use larvacut_models::{CropWindow, DetectionKey};

use crate::error::{MediaError, MediaResult};

/// A decoded grayscale video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed grayscale buffer.
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(MediaError::ShapeMismatch {
                expected: format!("{expected} bytes for {width}x{height}"),
                actual: format!("{} bytes", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn gray_at(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Add `beta` to every sample, saturating at 255.
    pub fn brightened(&self, beta: u8) -> Frame {
        let mut out = self.clone();
        if beta > 0 {
            out.data.iter_mut().for_each(|v| *v = v.saturating_add(beta));
        }
        out
    }

    /// Copy the pixels inside `window`, which must lie within the frame.
    pub fn crop(&self, window: &CropWindow) -> MediaResult<Frame> {
        if !window.fits_within(self.width, self.height) {
            return Err(MediaError::ShapeMismatch {
                expected: format!("window inside {}x{}", self.width, self.height),
                actual: format!("{window:?}"),
            });
        }
        Ok(self.copy_rect(window.x1, window.y1, window.width(), window.height()))
    }

    /// Copy the pixels under a detection box, clipped to the frame.
    pub fn region(&self, key: &DetectionKey) -> Frame {
        let x = key.x.min(self.width);
        let y = key.y.min(self.height);
        let width = key.x2().min(self.width) - x;
        let height = key.y2().min(self.height) - y;
        self.copy_rect(x, y, width, height)
    }

    fn copy_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Frame {
        let row_len = width as usize;
        let stride = self.width as usize;
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * stride + x as usize;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Frame {
            width,
            height,
            data,
        }
    }
}

/// Binary foreground mask; nonzero pixels are foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// An all-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Wrap a packed single channel buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(MediaError::ShapeMismatch {
                expected: format!("{expected} mask bytes for {width}x{height}"),
                actual: format!("{} bytes", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    /// Mark the rectangle `[x, x + width) x [y, y + height)` as foreground.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let x1 = x.min(self.width) as usize;
        let x2 = (x + width).min(self.width) as usize;
        for row in y.min(self.height)..(y + height).min(self.height) {
            let offset = row as usize * self.width as usize;
            self.data[offset + x1..offset + x2].fill(255);
        }
    }

    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Pixel-wise logical AND; foreground pixels keep the value of `self`.
    pub fn and(&self, other: &Mask) -> MediaResult<Mask> {
        if self.width != other.width || self.height != other.height {
            return Err(MediaError::ShapeMismatch {
                expected: format!("{}x{}", self.width, self.height),
                actual: format!("{}x{}", other.width, other.height),
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| if b != 0 { a } else { 0 })
            .collect();
        Ok(Mask {
            width: self.width,
            height: self.height,
            data,
        })
    }
}
