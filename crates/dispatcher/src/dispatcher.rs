//! Dispatcher - fan-out of synthesized frames to sinks

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{SinkConfig, SinkType, SynthesizedFrame};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builds sink handles from config, then the dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<SynthesizedFrame>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<SynthesizedFrame>) -> Self {
        Self { config, input_rx }
    }

    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.config.sinks.len()))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(Dispatcher::with_handles(handles, self.input_rx))
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let creation = |e| DispatcherError::sink_creation(config, e);
    let handle = match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::from_params(&config.name, &config.params).map_err(creation)?;
            SinkHandle::spawn(sink, config.queue_capacity)
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params).map_err(creation)?;
            SinkHandle::spawn(sink, config.queue_capacity)
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(creation)?;
            SinkHandle::spawn(sink, config.queue_capacity)
        }
    };
    Ok(handle)
}

/// Summary returned when the dispatcher stops
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Frames received from the tick loop
    pub frames: u64,
    /// Final per-sink counters, in config order
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// Fans every incoming frame out to all sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<SynthesizedFrame>,
}

impl Dispatcher {
    /// Dispatcher over prebuilt handles
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<SynthesizedFrame>,
    ) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the input channel closes, then drain and close every sink
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut frames: u64 = 0;
        while let Some(frame) = self.input_rx.recv().await {
            frames += 1;
            self.dispatch_frame(&frame);
            if frames % 100 == 0 {
                debug!(frames, "Dispatcher progress");
            }
        }
        info!(frames, "Dispatcher input closed, shutting down");

        let mut sinks = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            sinks.push((name, handle.shutdown().await));
        }

        info!("Dispatcher shutdown complete");
        DispatchReport { frames, sinks }
    }

    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    fn dispatch_frame(&self, frame: &SynthesizedFrame) {
        for handle in &self.handles {
            handle.offer(frame.clone());
        }
    }
}

/// Build a dispatcher straight from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<SynthesizedFrame>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(DispatcherConfig { sinks: sink_configs }, input_rx)
        .build()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::frame;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];

        let task = Dispatcher::with_handles(handles, input_rx).spawn();
        for i in 1..=5 {
            input_tx.send(frame(i)).await.unwrap();
        }
        drop(input_tx);

        let report = task.await.unwrap();
        assert_eq!(report.frames, 5);
        assert_eq!(report.sinks.len(), 2);
        for (_, snap) in &report.sinks {
            assert_eq!(snap.written, 5);
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let configs = vec![SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 50,
            params: HashMap::new(),
        }];

        let dispatcher = create_dispatcher(configs, input_rx).await.unwrap();
        assert_eq!(dispatcher.sink_count(), 1);
        let task = dispatcher.spawn();

        input_tx.send(frame(1)).await.unwrap();
        drop(input_tx);
        let report = task.await.unwrap();
        assert_eq!(report.sinks[0].0, "test_log");
    }

    #[tokio::test]
    async fn test_bad_network_sink_fails_creation() {
        let (_tx, input_rx) = mpsc::channel(1);
        let configs = vec![SinkConfig {
            name: "udp".to_string(),
            sink_type: SinkType::Network,
            queue_capacity: 10,
            params: HashMap::new(),
        }];

        let err = create_dispatcher(configs, input_rx).await.err().unwrap();
        assert_eq!(err.sink_name(), "udp");
        assert!(err.to_string().contains("missing 'addr'"), "got: {err}");
    }
}
