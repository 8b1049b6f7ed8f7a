//! SynthesizedFrame - SynthesisCore output
//!
//! One frame per tick, consumed by sinks.

use serde::{Deserialize, Serialize};

/// Output of one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedFrame {
    /// Tick sequence number (monotonically increasing, failed ticks leave gaps)
    pub tick_id: u64,

    /// Seconds since the core was created
    pub timestamp: f64,

    pub joint_count: usize,

    pub joint_dim: usize,

    /// Predicted pose, `joint_count * joint_dim` values in joint order
    pub pose: Vec<f32>,

    /// Tick metadata
    pub meta: TickMeta,
}

impl SynthesizedFrame {
    /// Pose of one joint
    pub fn joint(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.joint_dim)?;
        self.pose.get(start..start + self.joint_dim)
    }
}

/// Tick metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickMeta {
    /// A pending blend was resolved before inference
    pub blend_resolved: bool,

    /// Queued commands applied at tick start
    pub commands_applied: u32,

    /// Queued commands rejected at tick start (malformed / invalid joints)
    pub commands_rejected: u32,

    /// Reference sequence selected at tick time
    pub sequence_index: usize,

    /// Blend factor at tick time
    pub blend_factor: f32,

    /// Wall time spent in the tick body (milliseconds)
    pub processing_ms: f64,
}
