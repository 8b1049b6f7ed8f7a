//! SinkHandle - one sink, its own bounded queue and worker task
//!
//! The dispatcher only ever offers frames; a sink that cannot keep up loses
//! frames from its own queue and nobody else's.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{FrameSink, SynthesizedFrame};

use crate::metrics::{FrameOutcome, MetricsSnapshot, SinkMetrics};

/// Result of offering one frame to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Queue full; counted as dropped
    Dropped,
    /// Worker already gone; counted as dropped
    Closed,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<SynthesizedFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker that owns `sink` behind a queue of `queue_capacity` frames
    pub fn spawn<S: FrameSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (queue, frames) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            frames,
            metrics: Arc::clone(&metrics),
        };
        Self {
            name,
            queue,
            metrics,
            worker: tokio::spawn(worker.run()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a frame to the worker without waiting
    pub fn offer(&self, frame: SynthesizedFrame) -> Offer {
        match self.queue.try_send(frame) {
            Ok(()) => {
                let queued = self.queue.max_capacity() - self.queue.capacity();
                self.metrics.observe_depth(queued);
                Offer::Queued
            }
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.metrics.record(FrameOutcome::Dropped);
                warn!(sink = %self.name, tick_id = frame.tick_id, "sink queue full, frame dropped");
                Offer::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                self.metrics.record(FrameOutcome::Dropped);
                error!(sink = %self.name, tick_id = frame.tick_id, "sink worker is gone");
                Offer::Closed
            }
        }
    }

    /// Close the queue, let the worker write what is left, flush and close
    /// the sink; returns the sink's final counters
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        let Self {
            name,
            queue,
            metrics,
            worker,
        } = self;
        drop(queue);
        if let Err(e) = worker.await {
            error!(sink = %name, error = ?e, "sink worker panicked");
        }
        let snapshot = metrics.snapshot();
        debug!(sink = %name, %snapshot, "sink stopped");
        snapshot
    }
}

/// Owns the sink for the lifetime of its queue
struct SinkWorker<S> {
    sink: S,
    frames: mpsc::Receiver<SynthesizedFrame>,
    metrics: Arc<SinkMetrics>,
}

impl<S: FrameSink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip(self), fields(sink = %self.sink.name()))]
    async fn run(mut self) {
        while let Some(frame) = self.frames.recv().await {
            self.metrics.observe_depth(self.frames.len());
            let outcome = match self.sink.write(&frame).await {
                Ok(()) => FrameOutcome::Written(frame.tick_id),
                Err(e) => {
                    // the next frame is still attempted
                    error!(tick_id = frame.tick_id, error = %e, "frame write failed");
                    FrameOutcome::Failed
                }
            };
            self.metrics.record(outcome);
        }

        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "flush on shutdown failed");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "close on shutdown failed");
        }
    }
}
