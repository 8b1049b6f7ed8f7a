//! Pose algebra: how joint poses combine.
//!
//! Positions compose by vector addition, rotations by quaternion
//! multiplication (`existing ⊗ delta`, renormalised). Quaternions are stored
//! as `(w, x, y, z)`.

use contracts::{ChannelKind, PoseValue, SynthError};
use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};

const AXIS_EPSILON: f32 = 1e-6;

/// Composition rule selected from the skeleton's channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseAlgebra {
    Vector,
    Quaternion,
}

impl PoseAlgebra {
    pub fn for_channel(channel: ChannelKind) -> Self {
        match channel {
            ChannelKind::Position => Self::Vector,
            ChannelKind::Rotation => Self::Quaternion,
        }
    }

    /// Neutral element for one joint
    pub fn identity(&self, joint_dim: usize) -> Vec<f32> {
        match self {
            Self::Vector => vec![0.0; joint_dim],
            Self::Quaternion => vec![1.0, 0.0, 0.0, 0.0],
        }
    }

    /// `existing = existing ∘ delta`, in place
    pub fn compose(&self, existing: &mut [f32], delta: &[f32]) {
        match self {
            Self::Vector => {
                for (value, d) in existing.iter_mut().zip(delta) {
                    *value += d;
                }
            }
            Self::Quaternion => {
                if existing.len() != 4 || delta.len() != 4 {
                    return;
                }
                let lhs = to_unit(existing);
                let rhs = to_unit(delta);
                write_quaternion(existing, &(lhs * rhs));
            }
        }
    }

    /// Turn a command payload into `joint_dim` channel values
    ///
    /// Axis-angle and explicit quaternions are converted to unit quaternions;
    /// vector payloads must match `joint_dim` exactly.
    pub fn resolve_value(
        &self,
        address: &str,
        value: &PoseValue,
        joint_dim: usize,
    ) -> Result<Vec<f32>, SynthError> {
        match (self, value) {
            (Self::Vector, PoseValue::Vector { values }) => {
                if values.len() != joint_dim {
                    return Err(SynthError::malformed(
                        address,
                        format!("expected {joint_dim} position values, got {}", values.len()),
                    ));
                }
                Ok(values.clone())
            }
            (Self::Quaternion, PoseValue::Vector { values }) => match values.as_slice() {
                &[w, x, y, z] => normalized_quaternion(address, w, x, y, z),
                _ => Err(SynthError::malformed(
                    address,
                    format!("expected 4 quaternion values, got {}", values.len()),
                )),
            },
            (Self::Quaternion, &PoseValue::Quaternion { w, x, y, z }) => {
                normalized_quaternion(address, w, x, y, z)
            }
            (Self::Quaternion, PoseValue::AxisAngle { axis, angle }) => {
                axis_angle_to_quaternion(address, *axis, *angle)
            }
            (Self::Vector, _) => Err(SynthError::malformed(
                address,
                "rotation payload sent to a position skeleton",
            )),
        }
    }
}

/// Unit quaternion `(w, x, y, z)` for a rotation of `angle` radians about `axis`
///
/// The axis does not need to be normalised. A zero axis is only accepted
/// with a zero angle (identity).
pub fn axis_angle_to_quaternion(
    address: &str,
    axis: [f32; 3],
    angle: f32,
) -> Result<Vec<f32>, SynthError> {
    if !angle.is_finite() || axis.iter().any(|a| !a.is_finite()) {
        return Err(SynthError::malformed(address, "non-finite axis-angle"));
    }
    let rotation = match Unit::try_new(Vector3::new(axis[0], axis[1], axis[2]), AXIS_EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, angle),
        None if angle == 0.0 => UnitQuaternion::identity(),
        None => {
            return Err(SynthError::malformed(
                address,
                "zero rotation axis with non-zero angle",
            ))
        }
    };
    let mut out = vec![0.0; 4];
    write_quaternion(&mut out, &rotation);
    Ok(out)
}

fn normalized_quaternion(
    address: &str,
    w: f32,
    x: f32,
    y: f32,
    z: f32,
) -> Result<Vec<f32>, SynthError> {
    let q = Quaternion::new(w, x, y, z);
    if !q.norm().is_finite() || q.norm() < AXIS_EPSILON {
        return Err(SynthError::malformed(address, "degenerate quaternion"));
    }
    let mut out = vec![0.0; 4];
    write_quaternion(&mut out, &UnitQuaternion::from_quaternion(q));
    Ok(out)
}

// Degenerate buffer contents (e.g. an all-zero model output) act as identity.
fn to_unit(values: &[f32]) -> UnitQuaternion<f32> {
    let q = Quaternion::new(values[0], values[1], values[2], values[3]);
    let norm = q.norm();
    if norm.is_finite() && norm > AXIS_EPSILON {
        UnitQuaternion::from_quaternion(q)
    } else {
        UnitQuaternion::identity()
    }
}

fn write_quaternion(out: &mut [f32], q: &UnitQuaternion<f32>) {
    let q = q.quaternion();
    out[0] = q.w;
    out[1] = q.i;
    out[2] = q.j;
    out[3] = q.k;
}
