//! Run statistics.

use std::time::Duration;

use control::ControlSnapshot;
use dispatcher::MetricsSnapshot;
use observability::TickMetricsAggregator;
use synthesis_engine::TickLoopReport;

/// Statistics from one engine run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Tick loop counters and stop reason
    pub ticks: TickLoopReport,

    /// Control listener counters (None when control is disabled)
    pub control: Option<ControlSnapshot>,

    /// Final per-sink counters
    pub sinks: Vec<(String, MetricsSnapshot)>,

    pub duration: Duration,

    /// Aggregated tick metadata
    pub tick_metrics: TickMetricsAggregator,
}

impl PipelineStats {
    /// Achieved output rate
    pub fn fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.ticks.ticks_ok as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames: {}", self.ticks.ticks_ok);
        println!("   ├─ Failed ticks: {}", self.ticks.ticks_failed);
        println!("   ├─ Overruns: {}", self.ticks.overruns);
        println!("   ├─ Frames dropped before dispatch: {}", self.ticks.frames_dropped);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Stopped by: {:?}", self.ticks.stop_reason);

        if let Some(control) = &self.control {
            println!("\nControl");
            println!("   ├─ Received: {}", control.received);
            println!("   ├─ Forwarded: {}", control.forwarded);
            println!("   ├─ Malformed: {}", control.malformed);
            println!("   └─ Dropped (queue full): {}", control.dropped);
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, snapshot) in &self.sinks {
                println!("   ├─ {name}: {snapshot}");
            }
        }

        println!("\n{}", self.tick_metrics.summary());
    }
}
