//! Synthesis engine configuration contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Synthesis engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Sliding window length (frames fed to the model)
    #[serde(default = "default_seq_length")]
    #[validate(range(min = 2, message = "seq_length must be at least 2"))]
    pub seq_length: usize,

    /// Target output frame rate
    #[serde(default = "default_fps")]
    #[validate(range(exclusive_min = 0.0, message = "fps must be > 0"))]
    pub fps: f64,

    /// Reference sequence used to seed the window
    #[serde(default)]
    pub initial_sequence: usize,

    /// Capacity of the control -> tick command queue
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "command_queue_capacity must be > 0"))]
    pub command_queue_capacity: usize,

    /// What the tick loop does after a failed tick
    #[serde(default)]
    pub failure_policy: TickFailurePolicy,

    /// Stop after this many ticks (None = run until shutdown)
    #[serde(default)]
    #[validate(range(min = 1, message = "max_ticks must be > 0"))]
    pub max_ticks: Option<u64>,
}

fn default_seq_length() -> usize {
    64
}

fn default_fps() -> f64 {
    30.0
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seq_length: default_seq_length(),
            fps: default_fps(),
            initial_sequence: 0,
            command_queue_capacity: default_queue_capacity(),
            failure_policy: TickFailurePolicy::default(),
            max_ticks: None,
        }
    }
}

impl EngineConfig {
    /// Target interval between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// Strategy after a tick fails (inference error or shape mismatch)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickFailurePolicy {
    /// Report, emit nothing for this cycle, keep ticking
    #[default]
    Skip,
    /// Report and stop the loop
    Halt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval() {
        let config = EngineConfig {
            fps: 50.0,
            ..Default::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_short_window() {
        let config = EngineConfig {
            seq_length: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_fps() {
        let config = EngineConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
