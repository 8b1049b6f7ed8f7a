//! Fixed-length sliding window of pose frames.
//!
//! The length is set at construction and never changes:
//! - `slide` drops the oldest frame and appends one
//! - `replace_all` swaps in a same-length window

use std::collections::VecDeque;
use std::fmt;

use contracts::{PoseFrame, SynthError};

/// Sliding window fed to the model
#[derive(Clone, PartialEq)]
pub struct MotionBuffer {
    frames: VecDeque<PoseFrame>,
    seq_length: usize,
    pose_dim: usize,
}

impl fmt::Debug for MotionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionBuffer")
            .field("seq_length", &self.seq_length)
            .field("pose_dim", &self.pose_dim)
            .finish()
    }
}

impl MotionBuffer {
    /// Create a buffer from an initial window; every frame must have the same width
    pub fn new(frames: Vec<PoseFrame>) -> Result<Self, SynthError> {
        let pose_dim = frames
            .first()
            .map(PoseFrame::len)
            .ok_or_else(|| SynthError::invalid_library("motion buffer needs at least one frame"))?;
        check_widths(&frames, pose_dim)?;

        Ok(Self {
            seq_length: frames.len(),
            frames: frames.into(),
            pose_dim,
        })
    }

    #[inline]
    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn pose_dim(&self) -> usize {
        self.pose_dim
    }

    pub fn frame(&self, index: usize) -> Option<&PoseFrame> {
        self.frames.get(index)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut PoseFrame> {
        self.frames.get_mut(index)
    }

    /// Most recent frame
    pub fn last(&self) -> Option<&PoseFrame> {
        self.frames.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseFrame> {
        self.frames.iter()
    }

    /// Copy of the window, oldest first
    pub fn to_frames(&self) -> Vec<PoseFrame> {
        self.frames.iter().cloned().collect()
    }

    /// All values, frame after frame
    pub fn to_flat(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.seq_length * self.pose_dim);
        for frame in &self.frames {
            out.extend_from_slice(frame.as_slice());
        }
        out
    }

    /// Drop the oldest frame and append `frame`
    pub fn slide(&mut self, frame: PoseFrame) -> Result<(), SynthError> {
        if frame.len() != self.pose_dim {
            return Err(SynthError::inference(format!(
                "frame has {} values, buffer holds {}",
                frame.len(),
                self.pose_dim
            )));
        }
        self.frames.pop_front();
        self.frames.push_back(frame);
        Ok(())
    }

    /// Swap in a whole new window of the same shape
    pub fn replace_all(&mut self, frames: Vec<PoseFrame>) -> Result<(), SynthError> {
        if frames.len() != self.seq_length {
            return Err(SynthError::invalid_library(format!(
                "replacement window has {} frames, expected {}",
                frames.len(),
                self.seq_length
            )));
        }
        check_widths(&frames, self.pose_dim)?;
        self.frames = frames.into();
        Ok(())
    }
}

fn check_widths(frames: &[PoseFrame], pose_dim: usize) -> Result<(), SynthError> {
    match frames.iter().position(|f| f.len() != pose_dim) {
        Some(i) => Err(SynthError::invalid_library(format!(
            "frame {i} has {} values, expected {pose_dim}",
            frames[i].len()
        ))),
        None => Ok(()),
    }
}
