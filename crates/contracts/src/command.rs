//! Control commands - ControlDispatcher output
//!
//! `RawCommand` is what a transport delivers (address + positional arguments).
//! `ControlCommand` is the closed set of structured messages the synthesis core accepts.

use serde::{Deserialize, Serialize};

/// One positional argument of a raw command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ArgValue {
    /// Integer view; floats are accepted only when they carry an integral value
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Numeric view
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Int(v) => Some(*v as f32),
            Self::Float(v) => Some(*v as f32),
            Self::Text(_) => None,
        }
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Command as received from a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    /// Address / opcode (e.g. `/mocap/seqblend`)
    pub address: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<ArgValue>,
}

impl RawCommand {
    pub fn new(address: impl Into<String>, args: Vec<ArgValue>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// How an override combines with the pose already in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    /// Replace the joint pose
    Set,
    /// Compose with the joint pose (vector add / quaternion multiply)
    Change,
}

/// Pose payload of an override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoseValue {
    /// Raw channel values (positions, or an explicit quaternion)
    Vector { values: Vec<f32> },
    /// Unit quaternion `(w, x, y, z)`
    Quaternion { w: f32, x: f32, y: f32, z: f32 },
    /// Rotation axis + angle in radians
    AxisAngle { axis: [f32; 3], angle: f32 },
}

/// Joint pose edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointOverride {
    /// Joints receiving the same value
    pub joint_indices: Vec<i64>,
    pub value: PoseValue,
    /// `1` edits the second-to-last frame, `n > 1` edits the first `n` frames
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    pub mode: OverrideMode,
}

fn default_horizon() -> usize {
    1
}

impl JointOverride {
    pub fn new(joint_indices: Vec<i64>, value: PoseValue, mode: OverrideMode) -> Self {
        Self {
            joint_indices,
            value,
            horizon: 1,
            mode,
        }
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }
}

/// Structured control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Select the reference sequence
    SelectSequence { index: i64 },
    /// Set reference start frame and optionally frame count
    SetReferenceWindow {
        start: i64,
        #[serde(default)]
        count: Option<i64>,
    },
    /// Weight of the current buffer against the reference
    SetBlendFactor { factor: f32 },
    /// Joint pose edit
    Override(JointOverride),
    /// Reset the window from the current reference selection
    ReinitializeWindow,
}

impl ControlCommand {
    /// Stable label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelectSequence { .. } => "select_sequence",
            Self::SetReferenceWindow { .. } => "set_reference_window",
            Self::SetBlendFactor { .. } => "set_blend_factor",
            Self::Override(o) => match o.mode {
                OverrideMode::Set => "set_joint",
                OverrideMode::Change => "change_joint",
            },
            Self::ReinitializeWindow => "reinitialize_window",
        }
    }
}
