//! One autoregressive step: normalise window, predict, denormalise, slide.

use contracts::{NormalizedWindow, PoseFrame, SequenceModel, SynthError};
use nalgebra::{DMatrix, DVector};
use tracing::{instrument, trace};

use crate::buffer::MotionBuffer;
use crate::library::NormalizationStats;

/// Runs the model over the window and appends its prediction
#[derive(Debug, Clone, Copy)]
pub struct InferenceStep {
    seq_length: usize,
    joint_dim: usize,
}

impl InferenceStep {
    pub fn new(seq_length: usize, joint_dim: usize) -> Self {
        Self {
            seq_length,
            joint_dim,
        }
    }

    /// Predict the next frame and slide it into `buffer`
    ///
    /// The buffer is only modified after a successful, well-shaped prediction.
    #[instrument(
        level = "trace",
        name = "inference_step",
        skip(self, buffer, stats, model),
        fields(model = model.name())
    )]
    pub fn step(
        &self,
        buffer: &mut MotionBuffer,
        stats: &NormalizationStats,
        model: &mut dyn SequenceModel,
    ) -> Result<PoseFrame, SynthError> {
        if buffer.len() != self.seq_length {
            return Err(SynthError::inference(format!(
                "buffer holds {} frames, expected {}",
                buffer.len(),
                self.seq_length
            )));
        }
        let channels = buffer.pose_dim();
        if stats.channels() != channels {
            return Err(SynthError::inference(format!(
                "statistics cover {} channels, window has {channels}",
                stats.channels()
            )));
        }

        // One column per frame, so column-major storage is frame after frame.
        let mut window = DMatrix::from_column_slice(channels, self.seq_length, &buffer.to_flat());
        stats.normalize_columns(&mut window);

        let view = NormalizedWindow::new(window.as_slice(), self.seq_length, channels)
            .ok_or_else(|| SynthError::inference("window shape mismatch"))?;
        let predicted = model.predict(view)?;

        if predicted.len() != channels {
            return Err(SynthError::inference(format!(
                "model '{}' returned {} values, expected {channels}",
                model.name(),
                predicted.len()
            )));
        }
        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(SynthError::inference(format!(
                "model '{}' returned non-finite values",
                model.name()
            )));
        }

        let mut next = DVector::from_vec(predicted);
        stats.denormalize(&mut next);
        let frame = PoseFrame::from_flat(next.as_slice().to_vec(), self.joint_dim)?;

        buffer.slide(frame.clone())?;
        trace!("window advanced");
        Ok(frame)
    }
}
