//! LogSink - frame summaries via tracing

use std::collections::HashMap;

use contracts::{FrameSink, SynthError, SynthesizedFrame};
use tracing::{info, instrument};

/// Sink that logs one summary line every `every` frames
pub struct LogSink {
    name: String,
    every: u64,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
        }
    }

    /// Params: `every` (log every Nth frame, default 1)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, SynthError> {
        let name = name.into();
        let every = match params.get("every") {
            Some(raw) => raw.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                SynthError::sink_write(&name, format!("invalid 'every' value '{raw}'"))
            })?,
            None => 1,
        };
        Ok(Self {
            name,
            every,
            seen: 0,
        })
    }

    fn log_frame_summary(&self, frame: &SynthesizedFrame) {
        let root = frame.joint(0).unwrap_or_default();
        info!(
            sink = %self.name,
            tick_id = frame.tick_id,
            t = frame.timestamp,
            sequence = frame.meta.sequence_index,
            blend = frame.meta.blend_factor,
            blended = frame.meta.blend_resolved,
            commands = frame.meta.commands_applied,
            root = ?root,
            "SynthesizedFrame"
        );
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, tick_id = frame.tick_id)
    )]
    async fn write(&mut self, frame: &SynthesizedFrame) -> Result<(), SynthError> {
        self.seen += 1;
        if (self.seen - 1) % self.every == 0 {
            self.log_frame_summary(frame);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SynthError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), SynthError> {
        info!(sink = %self.name, frames = self.seen, "LogSink closed");
        Ok(())
    }
}
