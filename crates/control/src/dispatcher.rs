//! ControlDispatcher - decode and forward commands to the synthesis core
//!
//! Runs entirely in the control context. Accepted commands land in the core's
//! bounded queue; nothing here waits on the tick context.

use std::sync::Arc;

use async_channel::Receiver;
use contracts::{ControlCommand, RawCommand, Skeleton, SynthError};
use serde::Deserialize;
use synthesis_engine::SynthesisHandle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decoder::CommandDecoder;
use crate::error::{ControlError, Result};
use crate::stats::{ControlMetrics, ControlSnapshot};

/// JSON datagram payload
///
/// Either a tagged command (`{"command": "set_blend_factor", "factor": 0.5}`)
/// or a raw address + args pair (`{"address": "/mocap/seqblend", "args": [0.5]}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Datagram {
    Tagged(ControlCommand),
    Raw(RawCommand),
}

/// Command router from transports to a `SynthesisHandle`
#[derive(Debug, Clone)]
pub struct ControlDispatcher {
    decoder: CommandDecoder,
    handle: SynthesisHandle,
    metrics: Arc<ControlMetrics>,
}

impl ControlDispatcher {
    pub fn new(decoder: CommandDecoder, handle: SynthesisHandle) -> Self {
        Self {
            decoder,
            handle,
            metrics: Arc::new(ControlMetrics::new()),
        }
    }

    /// Dispatcher whose decoder matches the skeleton layout
    pub fn for_skeleton(skeleton: &Skeleton, handle: SynthesisHandle) -> Self {
        Self::new(
            CommandDecoder::new(skeleton.joint_dim(), skeleton.channel()),
            handle,
        )
    }

    pub fn decoder(&self) -> &CommandDecoder {
        &self.decoder
    }

    pub fn metrics(&self) -> Arc<ControlMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        self.metrics.snapshot()
    }

    /// Decode and forward a raw command
    pub fn dispatch_raw(&self, raw: &RawCommand) -> Result<()> {
        self.metrics.record_received();
        let command = self.decode(raw)?;
        self.forward(command)
    }

    /// Forward an already structured command
    pub fn dispatch(&self, command: ControlCommand) -> Result<()> {
        self.metrics.record_received();
        self.metrics.record_decoded();
        self.forward(command)
    }

    /// Parse one JSON datagram and forward it
    pub fn dispatch_datagram(&self, payload: &[u8]) -> Result<()> {
        self.metrics.record_received();
        let datagram: Datagram = serde_json::from_slice(payload).map_err(|e| {
            self.metrics.record_malformed();
            warn!(error = %e, len = payload.len(), "undecodable control datagram");
            ControlError::Datagram {
                message: e.to_string(),
            }
        })?;

        let command = match datagram {
            Datagram::Tagged(command) => {
                self.metrics.record_decoded();
                command
            }
            Datagram::Raw(raw) => self.decode(&raw)?,
        };
        self.forward(command)
    }

    /// Forward every command from an in-process channel until it closes
    pub fn spawn_channel_source(&self, rx: Receiver<RawCommand>) -> JoinHandle<ControlSnapshot> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Ok(raw) = rx.recv().await {
                // Rejections are already logged and counted
                let _ = dispatcher.dispatch_raw(&raw);
            }
            info!("channel command source closed");
            dispatcher.snapshot()
        })
    }

    fn decode(&self, raw: &RawCommand) -> Result<ControlCommand> {
        match self.decoder.decode(raw) {
            Ok(command) => {
                self.metrics.record_decoded();
                Ok(command)
            }
            Err(e) => {
                self.metrics.record_malformed();
                warn!(address = %raw.address, args = raw.args.len(), error = %e, "malformed command dropped");
                Err(e.into())
            }
        }
    }

    fn forward(&self, command: ControlCommand) -> Result<()> {
        let label = command.label();
        match self.handle.try_submit(command) {
            Ok(()) => {
                self.metrics.record_forwarded();
                metrics::counter!("mocap_control_forwarded_total", "command" => label).increment(1);
                debug!(command = label, "command queued");
                Ok(())
            }
            Err(e @ (SynthError::QueueFull { .. } | SynthError::QueueClosed)) => {
                self.metrics.record_dropped();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
