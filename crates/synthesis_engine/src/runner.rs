//! TickLoop - fixed-rate driver for the synthesis core.
//!
//! Each cycle runs one tick, hands the frame downstream and sleeps for what is
//! left of the interval. A late tick starts the next one immediately; there is
//! no catch-up burst and no retry.

use std::time::{Duration, Instant};

use contracts::{EngineConfig, SynthesizedFrame, TickFailurePolicy};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::engine::SynthesisCore;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown signalled (or its sender dropped)
    #[default]
    Shutdown,
    /// `max_ticks` reached
    TickLimit,
    /// A tick failed under `TickFailurePolicy::Halt`
    Halted,
    /// Frame consumer went away
    OutputClosed,
}

/// Counters from one loop run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickLoopReport {
    pub ticks_ok: u64,
    pub ticks_failed: u64,
    /// Ticks that took longer than the interval
    pub overruns: u64,
    /// Frames the consumer had no room for
    pub frames_dropped: u64,
    pub stop_reason: StopReason,
}

/// Fixed-rate tick driver
#[derive(Debug, Clone)]
pub struct TickLoop {
    interval: Duration,
    failure_policy: TickFailurePolicy,
    max_ticks: Option<u64>,
}

impl TickLoop {
    pub fn new(interval: Duration, failure_policy: TickFailurePolicy) -> Self {
        Self {
            interval,
            failure_policy,
            max_ticks: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            interval: config.tick_interval(),
            failure_policy: config.failure_policy,
            max_ticks: config.max_ticks,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick until shutdown, tick limit, halt, or consumer loss
    ///
    /// The tick in progress when shutdown is signalled always completes.
    pub async fn run(
        &self,
        core: &mut SynthesisCore,
        output: mpsc::Sender<SynthesizedFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TickLoopReport {
        let mut report = TickLoopReport::default();
        info!(
            interval_ms = self.interval.as_secs_f64() * 1000.0,
            max_ticks = ?self.max_ticks,
            policy = ?self.failure_policy,
            "tick loop started"
        );

        loop {
            if *shutdown.borrow() {
                report.stop_reason = StopReason::Shutdown;
                break;
            }
            if let Some(max) = self.max_ticks {
                if report.ticks_ok + report.ticks_failed >= max {
                    info!(ticks = max, "tick limit reached");
                    report.stop_reason = StopReason::TickLimit;
                    break;
                }
            }

            let started = Instant::now();
            match core.tick() {
                Ok(frame) => {
                    report.ticks_ok += 1;
                    metrics::counter!("mocap_synth_ticks_total", "status" => "ok").increment(1);
                    match output.try_send(frame) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(frame)) => {
                            report.frames_dropped += 1;
                            warn!(tick_id = frame.tick_id, "frame consumer full, dropping frame");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            warn!("frame consumer closed");
                            report.stop_reason = StopReason::OutputClosed;
                            break;
                        }
                    }
                }
                Err(e) => {
                    report.ticks_failed += 1;
                    metrics::counter!("mocap_synth_ticks_total", "status" => "failed").increment(1);
                    error!(tick = core.tick_count(), error = %e, "tick failed");
                    if self.failure_policy == TickFailurePolicy::Halt {
                        report.stop_reason = StopReason::Halted;
                        break;
                    }
                }
            }

            let elapsed = started.elapsed();
            metrics::histogram!("mocap_synth_tick_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
            let delay = self.interval.saturating_sub(elapsed);
            if delay.is_zero() {
                report.overruns += 1;
                debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "tick overran interval");
                tokio::task::yield_now().await;
                continue;
            }

            if !wait_or_shutdown(delay, &mut shutdown).await {
                report.stop_reason = StopReason::Shutdown;
                break;
            }
        }

        info!(
            ok = report.ticks_ok,
            failed = report.ticks_failed,
            overruns = report.overruns,
            reason = ?report.stop_reason,
            "tick loop stopped"
        );
        report
    }
}

/// Sleep for `delay`; `false` once shutdown is signalled or its sender is gone
///
/// A change notification that leaves the flag unset keeps the same deadline.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{PoseSequence, SequenceLibrary};
    use crate::models::LastFrameModel;
    use contracts::{ChannelKind, NormalizedWindow, PoseFrame, SequenceModel, Skeleton, SynthError};
    use std::sync::Arc;

    fn core_with(model: Box<dyn SequenceModel>) -> SynthesisCore {
        let skeleton = Arc::new(Skeleton::from_children(&[vec![]], 2, ChannelKind::Position).unwrap());
        let frames = (0..16).map(|i| PoseFrame::uniform(1, &[i as f32, 0.0])).collect();
        let library = Arc::new(SequenceLibrary::new(vec![PoseSequence::new(frames)], &skeleton).unwrap());
        let config = EngineConfig {
            seq_length: 4,
            ..Default::default()
        };
        SynthesisCore::new(skeleton, library, model, &config).unwrap()
    }

    /// Fails every other call
    struct FlakyModel(u32);

    impl SequenceModel for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }

        fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
            self.0 += 1;
            if self.0 % 2 == 0 {
                Err(SynthError::inference("flaky"))
            } else {
                Ok(window.frame(window.frames() - 1).unwrap_or_default().to_vec())
            }
        }
    }

    #[tokio::test]
    async fn stops_at_tick_limit() {
        let mut core = core_with(Box::new(LastFrameModel));
        let (tx, mut rx) = mpsc::channel(16);
        let (_stop, shutdown) = watch::channel(false);

        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Skip)
            .with_max_ticks(Some(5))
            .run(&mut core, tx, shutdown)
            .await;

        assert_eq!(report.ticks_ok, 5);
        assert_eq!(report.stop_reason, StopReason::TickLimit);
        let mut ids = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            ids.push(frame.tick_id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn skip_policy_leaves_gaps() {
        let mut core = core_with(Box::new(FlakyModel(0)));
        let (tx, mut rx) = mpsc::channel(16);
        let (_stop, shutdown) = watch::channel(false);

        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Skip)
            .with_max_ticks(Some(4))
            .run(&mut core, tx, shutdown)
            .await;

        assert_eq!(report.ticks_ok, 2);
        assert_eq!(report.ticks_failed, 2);
        let mut ids = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            ids.push(frame.tick_id);
        }
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn halt_policy_stops_on_failure() {
        let mut core = core_with(Box::new(FlakyModel(0)));
        let (tx, _rx) = mpsc::channel(16);
        let (_stop, shutdown) = watch::channel(false);

        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Halt)
            .run(&mut core, tx, shutdown)
            .await;

        assert_eq!(report.ticks_ok, 1);
        assert_eq!(report.ticks_failed, 1);
        assert_eq!(report.stop_reason, StopReason::Halted);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_loop() {
        let mut core = core_with(Box::new(LastFrameModel));
        let (tx, _rx) = mpsc::channel(1024);
        let (stop, shutdown) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = stop.send(true);
        });

        let report = TickLoop::new(Duration::from_millis(5), TickFailurePolicy::Skip)
            .run(&mut core, tx, shutdown)
            .await;
        stopper.await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Shutdown);
        assert!(report.ticks_ok >= 1);
    }

    #[tokio::test]
    async fn closed_consumer_stops_loop() {
        let mut core = core_with(Box::new(LastFrameModel));
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let (_stop, shutdown) = watch::channel(false);

        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Skip)
            .run(&mut core, tx, shutdown)
            .await;
        assert_eq!(report.stop_reason, StopReason::OutputClosed);
    }

    #[tokio::test]
    async fn unset_shutdown_change_keeps_deadline() {
        let (stop, mut shutdown) = watch::channel(false);
        let poke = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop.send(false).unwrap();
            stop
        });

        let started = Instant::now();
        assert!(wait_or_shutdown(Duration::from_millis(150), &mut shutdown).await);
        assert!(started.elapsed() >= Duration::from_millis(150));

        let stop = poke.await.unwrap();
        stop.send(true).unwrap();
        let started = Instant::now();
        assert!(!wait_or_shutdown(Duration::from_secs(5), &mut shutdown).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
