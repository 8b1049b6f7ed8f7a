//! SynthesisCore - single owner and writer of the motion window.

use std::sync::Arc;
use std::time::Instant;

use async_channel::Receiver;
use contracts::{
    ControlCommand, EngineConfig, JointOverride, PoseFrame, SequenceModel, Skeleton, SynthError,
    SynthesizedFrame, TickMeta,
};
use tracing::{debug, info, instrument, warn};

use crate::algebra::PoseAlgebra;
use crate::blend::{
    clamp_blend_factor, clamp_frame_count, clamp_start_frame, max_start_frame, BlendEngine,
    BlendState,
};
use crate::buffer::MotionBuffer;
use crate::handle::SynthesisHandle;
use crate::inference::InferenceStep;
use crate::library::SequenceLibrary;
use crate::overrides::{OverrideEngine, ResolvedOverride};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// Built, no tick yet
    Idle,
    /// At least one tick attempted
    Ticking,
}

/// Outcome of draining the command queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: u32,
    pub rejected: u32,
}

/// Autoregressive synthesis core
///
/// Owns the window, the blend selection and the model. Control contexts talk
/// to it only through [`SynthesisHandle`]; queued commands are applied at the
/// start of every tick, before blending and inference.
pub struct SynthesisCore {
    skeleton: Arc<Skeleton>,
    library: Arc<SequenceLibrary>,
    model: Box<dyn SequenceModel>,
    buffer: MotionBuffer,
    blend: BlendState,
    overrides: OverrideEngine,
    inference: InferenceStep,
    seq_length: usize,
    commands: Receiver<ControlCommand>,
    handle: SynthesisHandle,
    state: CoreState,
    tick_count: u64,
    started: Instant,
}

impl std::fmt::Debug for SynthesisCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisCore")
            .field("model", &self.model.name())
            .field("seq_length", &self.seq_length)
            .field("blend", &self.blend)
            .field("state", &self.state)
            .field("tick_count", &self.tick_count)
            .finish()
    }
}

impl SynthesisCore {
    /// Build the core and seed the window from
    /// `library[initial_sequence][0 .. seq_length]`
    pub fn new(
        skeleton: Arc<Skeleton>,
        library: Arc<SequenceLibrary>,
        model: Box<dyn SequenceModel>,
        config: &EngineConfig,
    ) -> Result<Self, SynthError> {
        let seq_length = config.seq_length;
        if seq_length < 2 {
            return Err(SynthError::config_validation(
                "engine.seq_length",
                "must be at least 2",
            ));
        }
        if library.joint_count() != skeleton.joint_count()
            || library.joint_dim() != skeleton.joint_dim()
        {
            return Err(SynthError::invalid_library(format!(
                "library layout {}x{} does not match skeleton {}x{}",
                library.joint_count(),
                library.joint_dim(),
                skeleton.joint_count(),
                skeleton.joint_dim()
            )));
        }
        if library.min_sequence_len() < seq_length {
            return Err(SynthError::invalid_library(format!(
                "shortest sequence has {} frames, seq_length is {seq_length}",
                library.min_sequence_len()
            )));
        }
        if config.initial_sequence >= library.len() {
            return Err(SynthError::config_validation(
                "engine.initial_sequence",
                format!(
                    "{} out of range ({} sequences)",
                    config.initial_sequence,
                    library.len()
                ),
            ));
        }

        let buffer = MotionBuffer::new(initial_window(&library, config.initial_sequence, 0, seq_length)?)?;
        let (tx, rx) = async_channel::bounded(config.command_queue_capacity.max(1));

        info!(
            joints = skeleton.joint_count(),
            joint_dim = skeleton.joint_dim(),
            sequences = library.len(),
            seq_length,
            model = model.name(),
            "synthesis core ready"
        );

        Ok(Self {
            overrides: OverrideEngine::new(
                PoseAlgebra::for_channel(skeleton.channel()),
                skeleton.joint_count(),
            ),
            inference: InferenceStep::new(seq_length, skeleton.joint_dim()),
            blend: BlendState::new(config.initial_sequence, seq_length),
            skeleton,
            library,
            model,
            buffer,
            seq_length,
            commands: rx,
            handle: SynthesisHandle::new(tx),
            state: CoreState::Idle,
            tick_count: 0,
            started: Instant::now(),
        })
    }

    /// Handle for control contexts
    pub fn handle(&self) -> SynthesisHandle {
        self.handle.clone()
    }

    /// Select the reference sequence; result is `min(max(index, 0), count - 1)`
    pub fn set_sequence_index(&mut self, index: i64) -> usize {
        let last = self.library.len().saturating_sub(1);
        let index = usize::try_from(index.max(0)).map_or(last, |i| i.min(last));
        self.blend.sequence_index = index;
        self.blend.dirty = true;
        index
    }

    /// Clamp to `[0, len - seq_length]` of the selected sequence
    pub fn set_start_frame(&mut self, start: i64) -> usize {
        let start = clamp_start_frame(start, self.selected_len(), self.seq_length);
        self.blend.start_frame = start;
        self.blend.dirty = true;
        start
    }

    /// Clamp to `[0, seq_length]`
    pub fn set_frame_count(&mut self, count: i64) -> usize {
        let count = clamp_frame_count(count, self.seq_length).min(self.selected_len());
        self.blend.frame_count = count;
        self.blend.dirty = true;
        count
    }

    pub fn set_reference_window(&mut self, start: i64, count: Option<i64>) {
        self.set_start_frame(start);
        if let Some(count) = count {
            self.set_frame_count(count);
        }
    }

    /// Clamp to `[0, 1]`, NaN becomes 0
    pub fn set_blend_factor(&mut self, factor: f32) -> f32 {
        let factor = clamp_blend_factor(factor);
        self.blend.blend_factor = factor;
        self.blend.dirty = true;
        factor
    }

    /// Apply an override to the window immediately
    ///
    /// Returns the number of joint poses written. Invalid joints are reported
    /// as `InvalidJointIndex` after the valid ones were applied.
    pub fn submit_override(&mut self, ov: &JointOverride) -> Result<usize, SynthError> {
        let resolved = self.resolve_override(ov)?;
        self.overrides.apply(&mut self.buffer, &resolved)
    }

    /// Reset the window to `library[index][start .. start + seq_length]`
    ///
    /// Discards any pending blend.
    pub fn reinitialize_window(&mut self) -> Result<(), SynthError> {
        let start = self
            .blend
            .start_frame
            .min(max_start_frame(self.selected_len(), self.seq_length));
        let frames = initial_window(&self.library, self.blend.sequence_index, start, self.seq_length)?;
        self.buffer.replace_all(frames)?;
        self.blend.start_frame = start;
        self.blend.dirty = false;
        debug!(sequence = self.blend.sequence_index, start, "window reinitialized");
        Ok(())
    }

    /// Route one command through the mutation API
    pub fn apply_command(&mut self, command: &ControlCommand) -> Result<(), SynthError> {
        match command {
            ControlCommand::SelectSequence { index } => {
                self.set_sequence_index(*index);
            }
            ControlCommand::SetReferenceWindow { start, count } => {
                self.set_reference_window(*start, *count);
            }
            ControlCommand::SetBlendFactor { factor } => {
                self.set_blend_factor(*factor);
            }
            ControlCommand::Override(ov) => {
                self.submit_override(ov)?;
            }
            ControlCommand::ReinitializeWindow => self.reinitialize_window()?,
        }
        Ok(())
    }

    /// Apply the commands queued when the drain starts, in arrival order
    ///
    /// Commands that arrive during the drain wait for the next tick.
    pub fn drain_commands(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        let queued = self.commands.len();
        for _ in 0..queued {
            let Ok(command) = self.commands.try_recv() else {
                break;
            };
            let label = command.label();
            match self.apply_command(&command) {
                Ok(()) => {
                    report.applied += 1;
                    metrics::counter!("mocap_synth_commands_total", "command" => label, "status" => "applied")
                        .increment(1);
                }
                Err(e) => {
                    report.rejected += 1;
                    metrics::counter!("mocap_synth_commands_total", "command" => label, "status" => e.kind())
                        .increment(1);
                    warn!(command = label, error = %e, "command rejected");
                }
            }
        }
        report
    }

    /// One synthesis step: drain commands, resolve a pending blend, predict
    ///
    /// A failed tick leaves the window as it was after command application and
    /// consumes its tick id.
    #[instrument(level = "trace", name = "synthesis_core_tick", skip(self), fields(tick = self.tick_count + 1))]
    pub fn tick(&mut self) -> Result<SynthesizedFrame, SynthError> {
        let started = Instant::now();
        self.state = CoreState::Ticking;
        self.tick_count += 1;
        let tick_id = self.tick_count;

        let report = self.drain_commands();

        let blend_resolved = self.blend.dirty;
        if blend_resolved {
            BlendEngine::resolve(&mut self.buffer, &mut self.blend, &self.library)?;
        }

        let predicted = self
            .inference
            .step(&mut self.buffer, self.library.stats(), self.model.as_mut())?;

        Ok(SynthesizedFrame {
            tick_id,
            timestamp: self.started.elapsed().as_secs_f64(),
            joint_count: self.skeleton.joint_count(),
            joint_dim: self.skeleton.joint_dim(),
            pose: predicted.into_vec(),
            meta: TickMeta {
                blend_resolved,
                commands_applied: report.applied,
                commands_rejected: report.rejected,
                sequence_index: self.blend.sequence_index,
                blend_factor: self.blend.blend_factor,
                processing_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
        })
    }

    pub fn buffer(&self) -> &MotionBuffer {
        &self.buffer
    }

    pub fn blend_state(&self) -> &BlendState {
        &self.blend
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// `(parent, child)` pairs for downstream rendering
    pub fn edges(&self) -> &[(usize, usize)] {
        self.skeleton.edges()
    }

    pub fn library(&self) -> &Arc<SequenceLibrary> {
        &self.library
    }

    pub fn state(&self) -> CoreState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    fn selected_len(&self) -> usize {
        self.library
            .sequence(self.blend.sequence_index)
            .map_or(self.seq_length, |s| s.len())
    }

    fn resolve_override(&self, ov: &JointOverride) -> Result<ResolvedOverride, SynthError> {
        if ov.horizon == 0 {
            return Err(SynthError::malformed("override", "horizon must be at least 1"));
        }
        let value = self.overrides.algebra().resolve_value(
            "override",
            &ov.value,
            self.skeleton.joint_dim(),
        )?;
        Ok(ResolvedOverride {
            joint_indices: ov.joint_indices.clone(),
            value,
            horizon: ov.horizon,
            mode: ov.mode,
        })
    }
}

fn initial_window(
    library: &SequenceLibrary,
    index: usize,
    start: usize,
    seq_length: usize,
) -> Result<Vec<PoseFrame>, SynthError> {
    library
        .sequence(index)
        .and_then(|s| s.slice(start, seq_length))
        .map(<[PoseFrame]>::to_vec)
        .ok_or_else(|| {
            SynthError::invalid_library(format!(
                "sequence {index} cannot provide frames {start}..{}",
                start + seq_length
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PoseSequence;
    use crate::models::{LastFrameModel, WindowMeanModel};
    use contracts::{ChannelKind, NormalizedWindow, OverrideMode, PoseValue};

    fn skeleton() -> Arc<Skeleton> {
        Arc::new(Skeleton::from_children(&[vec![1], vec![]], 2, ChannelKind::Position).unwrap())
    }

    /// Sequence `n` frame `i` holds `100 * n + i` on every channel
    fn library(sequences: usize, len: usize) -> Arc<SequenceLibrary> {
        let sequences = (0..sequences)
            .map(|n| {
                PoseSequence::new(
                    (0..len)
                        .map(|i| {
                            let v = (100 * n + i) as f32;
                            PoseFrame::uniform(2, &[v, v])
                        })
                        .collect(),
                )
            })
            .collect();
        Arc::new(SequenceLibrary::new(sequences, &skeleton()).unwrap())
    }

    fn config(seq_length: usize) -> EngineConfig {
        EngineConfig {
            seq_length,
            ..Default::default()
        }
    }

    fn core(seq_length: usize) -> SynthesisCore {
        SynthesisCore::new(skeleton(), library(3, 20), Box::new(LastFrameModel), &config(seq_length))
            .unwrap()
    }

    fn first_channel(core: &SynthesisCore) -> Vec<f32> {
        core.buffer().iter().map(|f| f.as_slice()[0]).collect()
    }

    // predictions pass through normalisation, so compare loosely
    fn assert_close(got: &[f32], want: &[f32]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-3, "{got:?} != {want:?}");
        }
    }

    struct BrokenModel;

    impl SequenceModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        fn predict(&mut self, _window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
            Err(SynthError::inference("boom"))
        }
    }

    #[test]
    fn seeds_window_from_initial_sequence() {
        let core = SynthesisCore::new(
            skeleton(),
            library(3, 20),
            Box::new(LastFrameModel),
            &EngineConfig {
                seq_length: 4,
                initial_sequence: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(first_channel(&core), vec![200.0, 201.0, 202.0, 203.0]);
        assert_eq!(core.state(), CoreState::Idle);
        assert_eq!(core.edges(), &[(0, 1)]);
    }

    #[test]
    fn rejects_short_library_and_bad_initial_index() {
        let err = SynthesisCore::new(skeleton(), library(1, 3), Box::new(LastFrameModel), &config(4))
            .unwrap_err();
        assert!(matches!(err, SynthError::InvalidLibrary { .. }));

        let err = SynthesisCore::new(
            skeleton(),
            library(1, 10),
            Box::new(LastFrameModel),
            &EngineConfig {
                seq_length: 4,
                initial_sequence: 1,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::ConfigValidation { .. }));
    }

    #[test]
    fn mutation_clamps() {
        let mut core = core(4);
        assert_eq!(core.set_sequence_index(-3), 0);
        assert_eq!(core.set_sequence_index(99), 2);
        assert_eq!(core.set_start_frame(-1), 0);
        assert_eq!(core.set_start_frame(1000), 16);
        assert_eq!(core.set_frame_count(-5), 0);
        assert_eq!(core.set_frame_count(10), 4);
        assert_eq!(core.set_blend_factor(f32::NAN), 0.0);
        assert_eq!(core.set_blend_factor(3.0), 1.0);
        assert!(core.blend_state().dirty);
    }

    #[test]
    fn tick_predicts_and_slides() {
        let mut core = core(4);
        let frame = core.tick().unwrap();

        assert_eq!(frame.tick_id, 1);
        assert_close(&frame.pose, &[3.0; 4]);
        assert_eq!(frame.joint_count, 2);
        assert!(!frame.meta.blend_resolved);
        assert_close(&first_channel(&core), &[1.0, 2.0, 3.0, 3.0]);
        assert_eq!(core.state(), CoreState::Ticking);
    }

    #[test]
    fn blend_resolves_once_before_inference() {
        let mut core = core(4);
        core.set_sequence_index(1);
        core.set_start_frame(5);

        let frame = core.tick().unwrap();
        assert!(frame.meta.blend_resolved);
        assert_eq!(frame.meta.sequence_index, 1);
        // full-window replacement then one slide
        assert_close(&first_channel(&core), &[106.0, 107.0, 108.0, 108.0]);

        let frame = core.tick().unwrap();
        assert!(!frame.meta.blend_resolved);
    }

    #[test]
    fn queued_commands_apply_at_next_tick() {
        let mut core = core(4);
        let handle = core.handle();
        handle.select_sequence(2).unwrap();
        handle.set_reference_window(3, None).unwrap();

        assert_eq!(core.blend_state().sequence_index, 0);
        let frame = core.tick().unwrap();
        assert_eq!(frame.meta.commands_applied, 2);
        assert_close(&first_channel(&core), &[204.0, 205.0, 206.0, 206.0]);
    }

    #[test]
    fn rejected_commands_are_counted() {
        let mut core = core(4);
        let handle = core.handle();
        handle
            .override_joints(vec![7], PoseValue::Vector { values: vec![1.0, 1.0] }, OverrideMode::Set)
            .unwrap();
        handle
            .override_joints(vec![0], PoseValue::Vector { values: vec![1.0] }, OverrideMode::Set)
            .unwrap();

        let frame = core.tick().unwrap();
        assert_eq!(frame.meta.commands_rejected, 2);
        assert_eq!(frame.meta.commands_applied, 0);
    }

    #[test]
    fn override_is_immediate() {
        let mut core = core(4);
        let ov = JointOverride::new(
            vec![1],
            PoseValue::Vector {
                values: vec![-1.0, -2.0],
            },
            OverrideMode::Set,
        );
        assert_eq!(core.submit_override(&ov).unwrap(), 1);
        assert_eq!(core.buffer().frame(2).unwrap().joint(1).unwrap(), &[-1.0, -2.0]);

        let err = core.submit_override(&ov.clone().with_horizon(0)).unwrap_err();
        assert!(matches!(err, SynthError::MalformedCommand { .. }));
    }

    #[test]
    fn reinitialize_uses_selection_and_clears_dirty() {
        let mut core = core(4);
        core.set_sequence_index(1);
        core.set_start_frame(2);
        core.reinitialize_window().unwrap();

        assert!(!core.blend_state().dirty);
        assert_eq!(first_channel(&core), vec![102.0, 103.0, 104.0, 105.0]);
    }

    #[test]
    fn failed_tick_keeps_buffer_and_consumes_id() {
        let mut core =
            SynthesisCore::new(skeleton(), library(1, 10), Box::new(BrokenModel), &config(4)).unwrap();
        let before = core.buffer().clone();

        assert!(matches!(core.tick(), Err(SynthError::InferenceFailure { .. })));
        assert_eq!(core.buffer(), &before);
        assert_eq!(core.tick_count(), 1);
    }

    #[test]
    fn constant_sequence_stays_constant() {
        let sk = Arc::new(Skeleton::from_children(&[vec![]], 2, ChannelKind::Position).unwrap());
        let frames = vec![PoseFrame::uniform(1, &[0.5, -0.5]); 8];
        let library = Arc::new(SequenceLibrary::new(vec![PoseSequence::new(frames)], &sk).unwrap());
        let mut core = SynthesisCore::new(sk, library, Box::new(WindowMeanModel), &config(4)).unwrap();

        for _ in 0..5 {
            let frame = core.tick().unwrap();
            assert_eq!(frame.pose, vec![0.5, -0.5]);
        }
    }

    #[test]
    fn drain_stops_at_commands_queued_on_entry() {
        let mut core = SynthesisCore::new(
            skeleton(),
            library(3, 20),
            Box::new(LastFrameModel),
            &EngineConfig {
                seq_length: 4,
                command_queue_capacity: 4,
                ..Default::default()
            },
        )
        .unwrap();
        let handle = core.handle();
        let stop = std::sync::atomic::AtomicBool::new(false);

        let report = std::thread::scope(|scope| {
            scope.spawn(|| {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let _ = handle.try_submit(ControlCommand::SetBlendFactor { factor: 0.5 });
                }
            });
            while handle.pending() < 4 {
                std::thread::yield_now();
            }
            let report = core.drain_commands();
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
            report
        });

        assert!(report.applied <= 4, "drained {} commands", report.applied);
        assert_eq!(report.rejected, 0);
    }
}
