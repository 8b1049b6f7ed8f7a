//! SequenceModel trait - the external predictor seam
//!
//! The model is an opaque function `normalized window -> normalized next frame`.
//! Implementations have no training surface: calls are pure inference.

use crate::SynthError;

/// Row-major view of a normalized window (`frames x channels`)
#[derive(Debug, Clone, Copy)]
pub struct NormalizedWindow<'a> {
    data: &'a [f32],
    frames: usize,
    channels: usize,
}

impl<'a> NormalizedWindow<'a> {
    /// Wrap a row-major buffer; `None` if the sizes disagree
    pub fn new(data: &'a [f32], frames: usize, channels: usize) -> Option<Self> {
        (frames.checked_mul(channels)? == data.len()).then_some(Self {
            data,
            frames,
            channels,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// One frame of the window
    pub fn frame(&self, index: usize) -> Option<&'a [f32]> {
        let start = index.checked_mul(self.channels)?;
        self.data.get(start..start + self.channels)
    }
}

/// Sequence continuation model
///
/// # Example
///
/// ```ignore
/// let window = NormalizedWindow::new(&values, seq_length, pose_dim).unwrap();
/// let next = model.predict(window)?; // pose_dim values
/// ```
pub trait SequenceModel: Send {
    /// Model name (used for logging)
    fn name(&self) -> &str;

    /// Predict the next normalized frame (`window.channels()` values)
    ///
    /// # Errors
    /// Any failure is fatal to the current tick only.
    fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError>;
}
