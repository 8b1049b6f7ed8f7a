//! Reference blending.
//!
//! Pulls `frame_count` frames of the selected reference sequence into the
//! window. A full-length selection replaces the window outright; a shorter one
//! mixes `blend_factor * current + (1 - blend_factor) * reference` over the
//! first `frame_count` frames and refills the remainder with the oldest
//! pre-blend frames.

use contracts::{PoseFrame, SynthError};
use tracing::{debug, instrument};

use crate::buffer::MotionBuffer;
use crate::library::SequenceLibrary;

/// Pending reference selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub sequence_index: usize,
    pub start_frame: usize,
    pub frame_count: usize,
    /// Weight of the current window, in `[0, 1]`
    pub blend_factor: f32,
    pub dirty: bool,
}

impl BlendState {
    pub fn new(sequence_index: usize, seq_length: usize) -> Self {
        Self {
            sequence_index,
            start_frame: 0,
            frame_count: seq_length,
            blend_factor: 1.0,
            dirty: false,
        }
    }
}

/// Last valid window start for a sequence of `sequence_len` frames
#[inline]
pub fn max_start_frame(sequence_len: usize, seq_length: usize) -> usize {
    sequence_len.saturating_sub(seq_length)
}

/// Clamp a requested start frame to `[0, sequence_len - seq_length]`
pub fn clamp_start_frame(start: i64, sequence_len: usize, seq_length: usize) -> usize {
    let max = max_start_frame(sequence_len, seq_length);
    usize::try_from(start.max(0)).map_or(max, |s| s.min(max))
}

/// Clamp a requested frame count to `[0, seq_length]`
pub fn clamp_frame_count(count: i64, seq_length: usize) -> usize {
    usize::try_from(count.max(0)).map_or(seq_length, |c| c.min(seq_length))
}

/// Clamp a blend factor to `[0, 1]`; NaN becomes 0
pub fn clamp_blend_factor(factor: f32) -> f32 {
    if factor.is_nan() {
        0.0
    } else {
        factor.clamp(0.0, 1.0)
    }
}

/// Applies a pending `BlendState` to the window
#[derive(Debug, Default, Clone, Copy)]
pub struct BlendEngine;

impl BlendEngine {
    /// Resolve the blend; `dirty` is cleared whatever the outcome
    #[instrument(
        level = "debug",
        name = "blend_resolve",
        skip(buffer, state, library),
        fields(sequence = state.sequence_index, start = state.start_frame, count = state.frame_count)
    )]
    pub fn resolve(
        buffer: &mut MotionBuffer,
        state: &mut BlendState,
        library: &SequenceLibrary,
    ) -> Result<(), SynthError> {
        state.dirty = false;
        let seq_length = buffer.seq_length();

        let sequence = library.sequence(state.sequence_index).ok_or_else(|| {
            SynthError::invalid_library(format!(
                "sequence index {} out of range ({} sequences)",
                state.sequence_index,
                library.len()
            ))
        })?;

        // The selection may predate a sequence change; re-clamp against the current one.
        let start = state
            .start_frame
            .min(max_start_frame(sequence.len(), seq_length));
        let count = state
            .frame_count
            .min(seq_length)
            .min(sequence.len() - start);
        let source = sequence.slice(start, count).ok_or_else(|| {
            SynthError::invalid_library(format!(
                "frames {start}..{} out of range for sequence {}",
                start + count,
                state.sequence_index
            ))
        })?;

        let next = if count == seq_length {
            source.to_vec()
        } else {
            let factor = state.blend_factor;
            let current = buffer.to_frames();
            let mut next = Vec::with_capacity(seq_length);
            for (cur, src) in current.iter().zip(source) {
                next.push(mix(cur, src, factor)?);
            }
            next.extend_from_slice(&current[..seq_length - count]);
            next
        };

        buffer.replace_all(next)?;
        debug!(start, count, factor = state.blend_factor, "reference blended");
        Ok(())
    }
}

fn mix(current: &PoseFrame, source: &PoseFrame, factor: f32) -> Result<PoseFrame, SynthError> {
    let values = current
        .as_slice()
        .iter()
        .zip(source.as_slice())
        .map(|(c, s)| factor * c + (1.0 - factor) * s)
        .collect();
    PoseFrame::from_flat(values, current.joint_dim())
}
