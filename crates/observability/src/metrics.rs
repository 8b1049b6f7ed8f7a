//! Tick 指标模块
//!
//! 基于 TickMeta 记录合成引擎的运行指标，并在内存中聚合出运行摘要。

use std::collections::BTreeMap;
use std::fmt;

use contracts::TickMeta;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 为 Prometheus 输出注册指标说明
pub fn describe_metrics() {
    describe_counter!("mocap_synth_frames_total", "Synthesized frames emitted");
    describe_counter!("mocap_synth_ticks_total", "Ticks by status (ok / failed)");
    describe_counter!(
        "mocap_synth_commands_total",
        "Queued commands by command and status"
    );
    describe_counter!(
        "mocap_synth_commands_dropped_total",
        "Commands dropped on a full queue"
    );
    describe_counter!("mocap_control_malformed_total", "Undecodable control input");
    describe_histogram!("mocap_synth_tick_duration_ms", "Tick loop cycle time");
    describe_histogram!("mocap_synth_processing_ms", "Tick body time (drain + blend + inference)");
    describe_gauge!("mocap_synth_blend_factor", "Current blend factor");
    describe_gauge!("mocap_synth_sequence_index", "Selected reference sequence");
    describe_gauge!(
        "mocap_synth_command_queue_depth",
        "Commands waiting for the next tick"
    );
}

/// 从 TickMeta 记录指标
///
/// 每产生一个 SynthesizedFrame 调用一次。
pub fn record_tick_metrics(meta: &TickMeta, tick_id: u64) {
    counter!("mocap_synth_frames_total").increment(1);
    gauge!("mocap_synth_last_tick_id").set(tick_id as f64);
    histogram!("mocap_synth_processing_ms").record(meta.processing_ms);

    gauge!("mocap_synth_blend_factor").set(meta.blend_factor as f64);
    gauge!("mocap_synth_sequence_index").set(meta.sequence_index as f64);
    if meta.blend_resolved {
        counter!("mocap_synth_blends_resolved_total").increment(1);
    }
}

/// 记录待处理命令数
pub fn record_command_queue_depth(depth: usize) {
    gauge!("mocap_synth_command_queue_depth").set(depth as f64);
}

/// 记录帧转发到 dispatcher 的结果
pub fn record_frame_forwarded(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("mocap_synth_frames_forwarded_total", "status" => status).increment(1);
}

/// Tick 指标聚合器
#[derive(Debug, Clone, Default)]
pub struct TickMetricsAggregator {
    pub total_frames: u64,
    /// 在推理前完成过一次混合的帧数
    pub blended_frames: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    /// 参考序列切换次数
    pub sequence_switches: u64,
    pub last_tick_id: Option<u64>,
    /// tick_id 不连续的次数 (失败的 tick 留下的空洞)
    pub tick_gaps: u64,
    pub processing_ms: RunningStats,
    pub blend_factor: RunningStats,
    /// 各参考序列被选中时输出的帧数
    pub frames_per_sequence: BTreeMap<usize, u64>,
    last_sequence: Option<usize>,
}

impl TickMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, meta: &TickMeta, tick_id: u64) {
        self.total_frames += 1;
        if meta.blend_resolved {
            self.blended_frames += 1;
        }
        self.commands_applied += u64::from(meta.commands_applied);
        self.commands_rejected += u64::from(meta.commands_rejected);

        if let Some(last) = self.last_tick_id {
            if tick_id > last + 1 {
                self.tick_gaps += 1;
            }
        }
        self.last_tick_id = Some(tick_id);

        if self
            .last_sequence
            .is_some_and(|last| last != meta.sequence_index)
        {
            self.sequence_switches += 1;
        }
        self.last_sequence = Some(meta.sequence_index);
        *self
            .frames_per_sequence
            .entry(meta.sequence_index)
            .or_insert(0) += 1;

        self.processing_ms.push(meta.processing_ms);
        self.blend_factor.push(meta.blend_factor as f64);
    }

    pub fn summary(&self) -> TickSummary {
        TickSummary {
            total_frames: self.total_frames,
            blended_frames: self.blended_frames,
            commands_applied: self.commands_applied,
            commands_rejected: self.commands_rejected,
            sequence_switches: self.sequence_switches,
            tick_gaps: self.tick_gaps,
            processing_ms: StatsSummary::from(&self.processing_ms),
            blend_factor: StatsSummary::from(&self.blend_factor),
            frames_per_sequence: self.frames_per_sequence.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub total_frames: u64,
    pub blended_frames: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub sequence_switches: u64,
    pub tick_gaps: u64,
    pub processing_ms: StatsSummary,
    pub blend_factor: StatsSummary,
    pub frames_per_sequence: BTreeMap<usize, u64>,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Synthesis Summary ===")?;
        writeln!(f, "Frames: {}", self.total_frames)?;
        writeln!(f, "Frames after blend: {}", self.blended_frames)?;
        writeln!(
            f,
            "Commands: {} applied, {} rejected",
            self.commands_applied, self.commands_rejected
        )?;
        writeln!(f, "Sequence switches: {}", self.sequence_switches)?;
        writeln!(f, "Tick id gaps: {}", self.tick_gaps)?;
        writeln!(f, "Tick processing (ms): {}", self.processing_ms)?;
        writeln!(f, "Blend factor: {}", self.blend_factor)?;
        if !self.frames_per_sequence.is_empty() {
            writeln!(f, "Frames per reference sequence:")?;
            for (sequence, frames) in &self.frames_per_sequence {
                writeln!(f, "  #{sequence}: {frames}")?;
            }
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    range: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.range = Some(match self.range {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差 (n - 1)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.range.map_or(0.0, |(lo, _)| lo)
    }

    pub fn max(&self) -> f64 {
        self.range.map_or(0.0, |(_, hi)| hi)
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}
