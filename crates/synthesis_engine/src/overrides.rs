//! Joint overrides: set or compose a pose on selected joints of selected frames.

use std::ops::Range;

use contracts::{OverrideMode, SynthError};
use tracing::{instrument, trace};

use crate::algebra::PoseAlgebra;
use crate::buffer::MotionBuffer;

/// Override with its payload already converted to channel values
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverride {
    pub joint_indices: Vec<i64>,
    /// `joint_dim` values, shared by every joint
    pub value: Vec<f32>,
    pub horizon: usize,
    pub mode: OverrideMode,
}

/// Frames touched by an override of the given horizon
///
/// Horizon 1 edits the second-to-last frame (the newest frame is the last
/// prediction). Larger horizons edit the oldest `horizon` frames.
/// A horizon-1 `Change` composes onto the newest frame's pose, not the
/// pose already in the target frame.
pub fn target_frames(horizon: usize, seq_length: usize) -> Range<usize> {
    if horizon <= 1 {
        let index = seq_length.saturating_sub(2);
        index..index + 1
    } else {
        0..horizon.min(seq_length)
    }
}

/// Writes overrides into the window
#[derive(Debug, Clone, Copy)]
pub struct OverrideEngine {
    algebra: PoseAlgebra,
    joint_count: usize,
}

impl OverrideEngine {
    pub fn new(algebra: PoseAlgebra, joint_count: usize) -> Self {
        Self {
            algebra,
            joint_count,
        }
    }

    pub fn algebra(&self) -> PoseAlgebra {
        self.algebra
    }

    /// Apply `ov` to every valid joint; returns how many joints were written
    ///
    /// Out-of-range joints are skipped and reported as `InvalidJointIndex`
    /// after the valid ones have been applied.
    #[instrument(
        level = "debug",
        name = "override_apply",
        skip(self, buffer, ov),
        fields(mode = ?ov.mode, horizon = ov.horizon, joints = ov.joint_indices.len())
    )]
    pub fn apply(&self, buffer: &mut MotionBuffer, ov: &ResolvedOverride) -> Result<usize, SynthError> {
        let (valid, invalid): (Vec<i64>, Vec<i64>) = ov
            .joint_indices
            .iter()
            .partition(|&&j| j >= 0 && (j as u64) < self.joint_count as u64);

        let frames = target_frames(ov.horizon, buffer.seq_length());
        let base = match ov.mode {
            OverrideMode::Change if ov.horizon <= 1 => buffer
                .seq_length()
                .checked_sub(1)
                .and_then(|newest| buffer.frame(newest))
                .cloned(),
            _ => None,
        };
        let mut written = 0;
        for frame_index in frames {
            let Some(frame) = buffer.frame_mut(frame_index) else {
                continue;
            };
            if frame.joint_dim() != ov.value.len() {
                return Err(SynthError::malformed(
                    "override",
                    format!(
                        "value has {} channels, joints have {}",
                        ov.value.len(),
                        frame.joint_dim()
                    ),
                ));
            }
            for &joint in &valid {
                if let Some(pose) = frame.joint_mut(joint as usize) {
                    match ov.mode {
                        OverrideMode::Set => pose.copy_from_slice(&ov.value),
                        OverrideMode::Change => {
                            if let Some(src) = base.as_ref().and_then(|f| f.joint(joint as usize)) {
                                pose.copy_from_slice(src);
                            }
                            self.algebra.compose(pose, &ov.value);
                        }
                    }
                    written += 1;
                }
            }
        }
        trace!(written, "override applied");

        if invalid.is_empty() {
            Ok(written)
        } else {
            Err(SynthError::InvalidJointIndex {
                indices: invalid,
                joint_count: self.joint_count,
            })
        }
    }
}
