//! Built-in sequence models for running without a trained network.

use contracts::{ModelKind, NormalizedWindow, SequenceModel, SynthError};
use nalgebra::DMatrix;

/// Build the model selected in configuration
pub fn build_model(kind: ModelKind) -> Box<dyn SequenceModel> {
    match kind {
        ModelKind::WindowMean => Box::new(WindowMeanModel),
        ModelKind::LastFrame => Box::new(LastFrameModel),
        ModelKind::LinearExtrapolation => Box::new(LinearExtrapolationModel),
    }
}

fn columns(window: &NormalizedWindow<'_>) -> DMatrix<f32> {
    DMatrix::from_column_slice(window.channels(), window.frames(), window.as_slice())
}

fn empty_window(model: &str) -> SynthError {
    SynthError::inference(format!("{model}: empty window"))
}

/// Per-channel mean over the window
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowMeanModel;

impl SequenceModel for WindowMeanModel {
    fn name(&self) -> &str {
        "window_mean"
    }

    fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
        if window.frames() == 0 {
            return Err(empty_window(self.name()));
        }
        Ok(columns(&window).column_mean().as_slice().to_vec())
    }
}

/// Repeats the newest frame
#[derive(Debug, Default, Clone, Copy)]
pub struct LastFrameModel;

impl SequenceModel for LastFrameModel {
    fn name(&self) -> &str {
        "last_frame"
    }

    fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
        window
            .frames()
            .checked_sub(1)
            .and_then(|i| window.frame(i))
            .map(<[f32]>::to_vec)
            .ok_or_else(|| empty_window(self.name()))
    }
}

/// `last + (last - previous)`
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearExtrapolationModel;

impl SequenceModel for LinearExtrapolationModel {
    fn name(&self) -> &str {
        "linear_extrapolation"
    }

    fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
        let frames = window.frames();
        if frames == 0 {
            return Err(empty_window(self.name()));
        }
        let m = columns(&window);
        let last = m.column(frames - 1);
        if frames == 1 {
            return Ok(last.iter().copied().collect());
        }
        let previous = m.column(frames - 2);
        Ok((last * 2.0 - previous).iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [f32; 6] = [0.0, 1.0, 2.0, 3.0, 4.0, 8.0];

    fn window() -> NormalizedWindow<'static> {
        // 3 frames of 2 channels: [0,1] [2,3] [4,8]
        NormalizedWindow::new(&DATA, 3, 2).unwrap()
    }

    #[test]
    fn test_window_mean() {
        assert_eq!(WindowMeanModel.predict(window()).unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_last_frame() {
        assert_eq!(LastFrameModel.predict(window()).unwrap(), vec![4.0, 8.0]);
    }

    #[test]
    fn test_linear_extrapolation() {
        assert_eq!(
            LinearExtrapolationModel.predict(window()).unwrap(),
            vec![6.0, 13.0]
        );
    }

    #[test]
    fn test_empty_window_fails() {
        let empty = NormalizedWindow::new(&[], 0, 2).unwrap();
        assert!(WindowMeanModel.predict(empty).is_err());
        assert!(LastFrameModel.predict(empty).is_err());
        assert!(LinearExtrapolationModel.predict(empty).is_err());
    }

    #[test]
    fn test_build_model_names() {
        assert_eq!(build_model(ModelKind::WindowMean).name(), "window_mean");
        assert_eq!(build_model(ModelKind::LastFrame).name(), "last_frame");
        assert_eq!(
            build_model(ModelKind::LinearExtrapolation).name(),
            "linear_extrapolation"
        );
    }
}
