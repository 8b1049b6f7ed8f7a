//! Reference pose sequences and the normalisation statistics derived from them.

use std::f32::consts::TAU;

use contracts::{ChannelKind, LibraryConfig, PoseFrame, Skeleton, SynthError};
use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};

/// Ordered, immutable run of pose frames
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSequence {
    frames: Vec<PoseFrame>,
}

impl PoseSequence {
    pub fn new(frames: Vec<PoseFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&PoseFrame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    /// `frames[start .. start + count]`, `None` if out of range
    pub fn slice(&self, start: usize, count: usize) -> Option<&[PoseFrame]> {
        self.frames.get(start..start.checked_add(count)?)
    }
}

/// Per-channel mean and population standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationStats {
    mean: DVector<f32>,
    std: DVector<f32>,
}

impl NormalizationStats {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self, SynthError> {
        if mean.len() != std.len() || mean.is_empty() {
            return Err(SynthError::invalid_library(format!(
                "mean/std length mismatch ({} vs {})",
                mean.len(),
                std.len()
            )));
        }
        Ok(Self {
            mean: DVector::from_vec(mean),
            std: DVector::from_vec(std),
        })
    }

    /// Two-pass statistics over every frame; accumulated in f64
    pub fn from_frames<'a>(
        frames: impl IntoIterator<Item = &'a PoseFrame> + Clone,
        channels: usize,
    ) -> Result<Self, SynthError> {
        let mut count = 0usize;
        let mut sum = vec![0.0f64; channels];
        for frame in frames.clone() {
            if frame.len() != channels {
                return Err(SynthError::invalid_library(format!(
                    "frame has {} channels, expected {channels}",
                    frame.len()
                )));
            }
            for (acc, v) in sum.iter_mut().zip(frame.as_slice()) {
                *acc += f64::from(*v);
            }
            count += 1;
        }
        if count == 0 {
            return Err(SynthError::invalid_library("no frames to compute statistics"));
        }

        let mean: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
        let mut sq = vec![0.0f64; channels];
        for frame in frames {
            for ((acc, v), m) in sq.iter_mut().zip(frame.as_slice()).zip(&mean) {
                let d = f64::from(*v) - m;
                *acc += d * d;
            }
        }

        Self::new(
            mean.iter().map(|m| *m as f32).collect(),
            sq.iter().map(|s| (s / count as f64).sqrt() as f32).collect(),
        )
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f32] {
        self.mean.as_slice()
    }

    pub fn std(&self) -> &[f32] {
        self.std.as_slice()
    }

    /// Normalise a `channels x frames` window (one column per frame)
    ///
    /// Zero-variance channels yield non-finite values which are replaced by 0.
    pub fn normalize_columns(&self, window: &mut DMatrix<f32>) {
        for mut column in window.column_iter_mut() {
            column -= &self.mean;
            column.component_div_assign(&self.std);
        }
        window.apply(|v| {
            if !v.is_finite() {
                *v = 0.0;
            }
        });
    }

    /// `value * std + mean`
    pub fn denormalize(&self, frame: &mut DVector<f32>) {
        frame.component_mul_assign(&self.std);
        *frame += &self.mean;
    }
}

/// Immutable set of reference sequences for one skeleton
#[derive(Debug, Clone)]
pub struct SequenceLibrary {
    sequences: Vec<PoseSequence>,
    joint_count: usize,
    joint_dim: usize,
    stats: NormalizationStats,
}

impl SequenceLibrary {
    /// Validate layout against the skeleton and precompute statistics
    pub fn new(sequences: Vec<PoseSequence>, skeleton: &Skeleton) -> Result<Self, SynthError> {
        if sequences.is_empty() {
            return Err(SynthError::invalid_library("library has no sequences"));
        }
        let pose_dim = skeleton.pose_dim();
        for (i, sequence) in sequences.iter().enumerate() {
            if sequence.is_empty() {
                return Err(SynthError::invalid_library(format!("sequence {i} is empty")));
            }
            if let Some(frame) = sequence
                .frames()
                .iter()
                .find(|f| f.len() != pose_dim || f.joint_dim() != skeleton.joint_dim())
            {
                return Err(SynthError::invalid_library(format!(
                    "sequence {i} has a frame of {} values (joint_dim {}), skeleton expects {pose_dim} (joint_dim {})",
                    frame.len(),
                    frame.joint_dim(),
                    skeleton.joint_dim()
                )));
            }
        }

        let stats = NormalizationStats::from_frames(
            sequences.iter().flat_map(|s| s.frames().iter()),
            pose_dim,
        )?;

        Ok(Self {
            sequences,
            joint_count: skeleton.joint_count(),
            joint_dim: skeleton.joint_dim(),
            stats,
        })
    }

    /// Procedurally generated reference motion
    ///
    /// Sequence `n` oscillates at `(n + 1) * frequency_hz`; every joint and
    /// channel gets its own phase. Rotation skeletons get small rotations
    /// about a per-joint axis.
    pub fn synthetic(
        skeleton: &Skeleton,
        config: &LibraryConfig,
        fps: f64,
    ) -> Result<Self, SynthError> {
        if fps <= 0.0 || !fps.is_finite() {
            return Err(SynthError::invalid_library("fps must be positive"));
        }
        let joint_count = skeleton.joint_count();
        let joint_dim = skeleton.joint_dim();

        let sequences = (0..config.sequence_count)
            .map(|n| {
                let freq = config.frequency_hz * (n as f32 + 1.0);
                let frames = (0..config.frames)
                    .map(|f| {
                        let t = (f as f64 / fps) as f32;
                        let mut values = Vec::with_capacity(joint_count * joint_dim);
                        for joint in 0..joint_count {
                            let phase = joint as f32 * 0.37;
                            match skeleton.channel() {
                                ChannelKind::Position => {
                                    for c in 0..joint_dim {
                                        let p = phase + c as f32 * 1.1;
                                        values.push(config.amplitude * (TAU * freq * t + p).sin());
                                    }
                                }
                                ChannelKind::Rotation => {
                                    let axis = match joint % 3 {
                                        0 => Vector3::x_axis(),
                                        1 => Vector3::y_axis(),
                                        _ => Vector3::z_axis(),
                                    };
                                    let angle = 0.5 * config.amplitude * (TAU * freq * t + phase).sin();
                                    let q = UnitQuaternion::from_axis_angle(&axis, angle);
                                    values.extend_from_slice(&[q.w, q.i, q.j, q.k]);
                                }
                            }
                        }
                        PoseFrame::from_flat(values, joint_dim)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PoseSequence::new(frames))
            })
            .collect::<Result<Vec<_>, SynthError>>()?;

        Self::new(sequences, skeleton)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequence(&self, index: usize) -> Option<&PoseSequence> {
        self.sequences.get(index)
    }

    /// Length of the shortest sequence
    pub fn min_sequence_len(&self) -> usize {
        self.sequences.iter().map(PoseSequence::len).min().unwrap_or(0)
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn joint_dim(&self) -> usize {
        self.joint_dim
    }

    pub fn pose_dim(&self) -> usize {
        self.joint_count * self.joint_dim
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }
}
