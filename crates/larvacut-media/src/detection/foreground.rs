//! Foreground masks: background subtraction gated by an edge mask.
//!
//! The background model catches anything that moves, including drifting
//! particles and illumination flicker. The edge mask keeps only regions with
//! enough structure to be a larva, so the AND of both is what blob
//! extraction sees.

use crate::error::MediaResult;
use crate::frame::{Frame, Mask};

/// Learning rate passed to the background model for every frame.
pub const BACKGROUND_LEARNING_RATE: f64 = 0.001;

/// Trainable statistical background model.
pub trait BackgroundModel: Send {
    /// Update the model with `frame` and return its foreground mask.
    ///
    /// Shadow pixels, when the model detects them, are nonzero.
    fn apply(&mut self, frame: &Frame, learning_rate: f64) -> MediaResult<Mask>;
}

/// Stateless edge and denoise filter.
pub trait EdgeMasker: Send {
    /// Mask of regions with strong, connected edges.
    fn mask(&self, frame: &Frame) -> MediaResult<Mask>;
}

/// Noise suppression and brightness lift applied before both models.
pub trait Preprocessor: Send {
    fn apply(&self, frame: &Frame) -> MediaResult<Frame>;
}

/// Background subtraction AND edge mask over a preprocessed frame.
pub struct ForegroundDetector<B, E, P> {
    background: B,
    edges: E,
    preprocess: P,
}

impl<B: BackgroundModel, E: EdgeMasker, P: Preprocessor> ForegroundDetector<B, E, P> {
    pub fn new(background: B, edges: E, preprocess: P) -> Self {
        Self {
            background,
            edges,
            preprocess,
        }
    }

    /// Feed one frame to the background model without producing a mask.
    pub fn train(&mut self, frame: &Frame) -> MediaResult<()> {
        let gray = self.preprocess.apply(frame)?;
        self.background.apply(&gray, BACKGROUND_LEARNING_RATE)?;
        Ok(())
    }

    /// Foreground mask of `frame`; also adapts the background model.
    pub fn mask(&mut self, frame: &Frame) -> MediaResult<Mask> {
        let gray = self.preprocess.apply(frame)?;
        let foreground = self.background.apply(&gray, BACKGROUND_LEARNING_RATE)?;
        let edges = self.edges.mask(&gray)?;
        foreground.and(&edges)
    }
}
