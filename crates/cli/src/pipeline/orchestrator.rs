//! Pipeline orchestrator - wires engine, control listener and dispatcher.
//!
//! Task layout:
//! - tick loop (this task) owns the `SynthesisCore`
//! - control listener feeds the core's command queue
//! - forwarder records tick metrics and hands frames to the dispatcher
//! - dispatcher fans frames out to sinks

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{SynthesisBlueprint, SynthesizedFrame};
use control::{ControlDispatcher, UdpCommandListener};
use observability::{
    record_command_queue_depth, record_frame_forwarded, record_tick_metrics, TickMetricsAggregator,
};
use synthesis_engine::{build_model, SequenceLibrary, SynthesisCore, TickLoop};
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: SynthesisBlueprint,

    /// Run timeout (None = until shutdown or tick limit)
    pub timeout: Option<Duration>,

    /// Frame channel size between tick loop and dispatcher
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` flips, the timeout fires, or the tick loop stops on its own
    #[instrument(name = "pipeline_run", skip(self, shutdown))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!(port, "Metrics endpoint available");
        }

        // Engine
        let skeleton = Arc::new(blueprint.skeleton.build().map_err(CliError::from)?);
        let library = Arc::new(
            SequenceLibrary::synthetic(&skeleton, &blueprint.library, blueprint.engine.fps)
                .map_err(CliError::from)?,
        );
        let model = build_model(blueprint.model.kind);
        let mut core = SynthesisCore::new(
            Arc::clone(&skeleton),
            library,
            model,
            &blueprint.engine,
        )
        .map_err(CliError::from)?;
        info!(
            joints = skeleton.joint_count(),
            joint_dim = skeleton.joint_dim(),
            seq_length = core.seq_length(),
            model = core.model_name(),
            "Synthesis core ready"
        );

        // Dispatch
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - synthesized frames will be discarded");
        }
        let (sink_tx, sink_rx) =
            mpsc::channel::<SynthesizedFrame>(self.config.buffer_size.max(1));
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), sink_rx)
            .await
            .map_err(CliError::from)?;
        let dispatcher_task = dispatcher.spawn();

        let (tick_tx, mut tick_rx) =
            mpsc::channel::<SynthesizedFrame>(self.config.buffer_size.max(1));
        let queue = core.handle();
        let forwarder = tokio::spawn(async move {
            let mut aggregator = TickMetricsAggregator::new();
            while let Some(frame) = tick_rx.recv().await {
                record_tick_metrics(&frame.meta, frame.tick_id);
                record_command_queue_depth(queue.pending());
                aggregator.update(&frame.meta, frame.tick_id);
                let delivered = sink_tx.send(frame).await.is_ok();
                record_frame_forwarded(delivered);
                if !delivered {
                    warn!("Dispatcher channel closed");
                    break;
                }
            }
            aggregator
        });

        let (stop_tx, stop_rx) = watch::channel(false);

        // Control
        let control_task = if blueprint.control.enabled {
            let dispatcher = ControlDispatcher::for_skeleton(&skeleton, core.handle());
            let listener = UdpCommandListener::bind(
                &blueprint.control.bind_addr,
                dispatcher,
                blueprint.control.max_datagram_size,
            )
            .await
            .map_err(CliError::from)?;
            info!(addr = ?listener.local_addr().ok(), "Control listener bound");
            Some(listener.spawn(stop_rx.clone()))
        } else {
            info!("Control listener disabled");
            None
        };

        // Local stop signal: external shutdown or timeout
        let timeout = self.config.timeout;
        let stop_trigger = stop_tx.clone();
        let watcher = tokio::spawn(async move {
            let deadline = async {
                match timeout {
                    Some(t) => tokio::time::sleep(t).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => info!("Shutdown requested"),
                _ = deadline => warn!("Run timed out"),
            }
            let _ = stop_trigger.send(true);
        });

        // Tick loop runs here until stopped; dropping tick_tx closes the chain
        let report = TickLoop::from_config(&blueprint.engine)
            .run(&mut core, tick_tx, stop_rx)
            .await;

        info!("Shutting down pipeline...");
        let _ = stop_tx.send(true);
        watcher.abort();

        let control = match control_task {
            Some(task) => Some(
                task.await
                    .map_err(|e| CliError::task(format!("control listener: {e}")))?,
            ),
            None => None,
        };
        let tick_metrics = forwarder
            .await
            .map_err(|e| CliError::task(format!("frame forwarder: {e}")))?;
        let dispatch = tokio::time::timeout(Duration::from_secs(5), dispatcher_task)
            .await
            .context("Dispatcher did not drain within 5s")?
            .map_err(|e| CliError::task(format!("dispatcher: {e}")))?;

        let stats = PipelineStats {
            ticks: report,
            control,
            sinks: dispatch.sinks,
            duration: start_time.elapsed(),
            tick_metrics,
        };
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }
}
