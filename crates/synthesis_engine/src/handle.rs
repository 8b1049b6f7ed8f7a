//! SynthesisHandle - control-side entry to the engine.
//!
//! Commands travel through a bounded queue and are applied by the core at the
//! start of its next tick; the handle never touches the motion buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use contracts::{ControlCommand, JointOverride, OverrideMode, PoseValue, SynthError};
use tracing::warn;

/// Clonable command sender
#[derive(Debug, Clone)]
pub struct SynthesisHandle {
    tx: Sender<ControlCommand>,
    dropped: Arc<AtomicU64>,
}

impl SynthesisHandle {
    pub(crate) fn new(tx: Sender<ControlCommand>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a command without waiting
    ///
    /// A full queue drops the command (warn + counter).
    pub fn try_submit(&self, command: ControlCommand) -> Result<(), SynthError> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("mocap_synth_commands_dropped_total", "command" => command.label())
                    .increment(1);
                warn!(command = command.label(), "command queue full, dropping command");
                Err(SynthError::QueueFull {
                    command: command.label().to_string(),
                })
            }
            Err(TrySendError::Closed(_)) => Err(SynthError::QueueClosed),
        }
    }

    /// Queue a command, waiting for room
    pub async fn submit(&self, command: ControlCommand) -> Result<(), SynthError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SynthError::QueueClosed)
    }

    pub fn select_sequence(&self, index: i64) -> Result<(), SynthError> {
        self.try_submit(ControlCommand::SelectSequence { index })
    }

    pub fn set_reference_window(&self, start: i64, count: Option<i64>) -> Result<(), SynthError> {
        self.try_submit(ControlCommand::SetReferenceWindow { start, count })
    }

    pub fn set_blend_factor(&self, factor: f32) -> Result<(), SynthError> {
        self.try_submit(ControlCommand::SetBlendFactor { factor })
    }

    pub fn override_joints(
        &self,
        joint_indices: Vec<i64>,
        value: PoseValue,
        mode: OverrideMode,
    ) -> Result<(), SynthError> {
        self.try_submit(ControlCommand::Override(JointOverride::new(
            joint_indices,
            value,
            mode,
        )))
    }

    pub fn reinitialize_window(&self) -> Result<(), SynthError> {
        self.try_submit(ControlCommand::ReinitializeWindow)
    }

    /// Commands waiting for the next tick
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Commands dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
