//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 引擎 + 控制 + 分发的端到端测试
//! - 配置文件到引擎的装配测试

/// 测试用引擎装配
#[cfg(test)]
mod support {
    use std::sync::Arc;

    use contracts::{
        ChannelKind, EngineConfig, NormalizedWindow, PoseFrame, SequenceModel, Skeleton, SynthError,
    };
    use synthesis_engine::{PoseSequence, SequenceLibrary, SynthesisCore};

    pub const SEQ_LENGTH: usize = 4;

    /// 两关节位置骨架 (0 -> 1)
    pub fn skeleton() -> Arc<Skeleton> {
        Arc::new(Skeleton::from_children(&[vec![1], vec![]], 3, ChannelKind::Position).unwrap())
    }

    /// 每个序列的所有帧都是同一个常量姿态
    pub fn constant_library(skeleton: &Skeleton, values: &[f32]) -> Arc<SequenceLibrary> {
        let sequences = values
            .iter()
            .map(|v| {
                let frames = (0..16)
                    .map(|_| PoseFrame::uniform(skeleton.joint_count(), &[*v; 3]))
                    .collect();
                PoseSequence::new(frames)
            })
            .collect();
        Arc::new(SequenceLibrary::new(sequences, skeleton).unwrap())
    }

    pub fn core(values: &[f32], model: Box<dyn SequenceModel>) -> SynthesisCore {
        seeded_core(values, 0, model)
    }

    /// 初始窗口取自 `initial_sequence`
    pub fn seeded_core(
        values: &[f32],
        initial_sequence: usize,
        model: Box<dyn SequenceModel>,
    ) -> SynthesisCore {
        let skeleton = skeleton();
        let library = constant_library(&skeleton, values);
        let config = EngineConfig {
            seq_length: SEQ_LENGTH,
            initial_sequence,
            ..Default::default()
        };
        SynthesisCore::new(skeleton, library, model, &config).unwrap()
    }

    /// 每次都预测同一个归一化值
    pub struct ConstantModel(pub f32);

    impl SequenceModel for ConstantModel {
        fn name(&self) -> &str {
            "constant"
        }

        fn predict(&mut self, window: NormalizedWindow<'_>) -> Result<Vec<f32>, SynthError> {
            Ok(vec![self.0; window.channels()])
        }
    }

    pub fn assert_all_close(values: &[f32], expected: f32) {
        for v in values {
            assert!((v - expected).abs() < 1e-4, "expected {expected}, got {values:?}");
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{ControlCommand, RawCommand};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_tagged_and_raw_json_shapes() {
        let tagged: ControlCommand =
            serde_json::from_str(r#"{ "command": "set_blend_factor", "factor": 0.25 }"#).unwrap();
        assert_eq!(tagged, ControlCommand::SetBlendFactor { factor: 0.25 });

        let raw: RawCommand =
            serde_json::from_str(r#"{ "address": "/mocap/seqinput", "args": [3, 8] }"#).unwrap();
        assert_eq!(raw.address, "/mocap/seqinput");
        assert_eq!(raw.args.len(), 2);
    }
}

#[cfg(test)]
mod engine_tests {
    use super::support::{self, assert_all_close, ConstantModel, SEQ_LENGTH};
    use contracts::{ArgValue, RawCommand};
    use control::{ControlDispatcher, CHANGE_JOINT_POS, SET_JOINT_POS};
    use synthesis_engine::{LastFrameModel, WindowMeanModel};

    /// 常量参考序列 + 窗口均值模型：输出恒等于该常量
    #[test]
    fn test_constant_sequence_is_a_fixed_point() {
        let mut core = support::core(&[0.5], Box::new(WindowMeanModel));

        for expected_id in 1..=6 {
            let frame = core.tick().unwrap();
            assert_eq!(frame.tick_id, expected_id);
            assert_eq!(frame.pose.len(), 2 * 3);
            assert_all_close(&frame.pose, 0.5);
        }
        assert_eq!(core.buffer().len(), SEQ_LENGTH);
    }

    #[test]
    fn test_multi_joint_override_reaches_window() {
        let mut core = support::core(&[1.0, 5.0], Box::new(LastFrameModel));
        let control = ControlDispatcher::for_skeleton(core.skeleton(), core.handle());

        control
            .dispatch_raw(&RawCommand::new(
                SET_JOINT_POS,
                vec![
                    ArgValue::Int(0),
                    ArgValue::Int(1),
                    ArgValue::Float(9.0),
                    ArgValue::Float(9.0),
                    ArgValue::Float(9.0),
                ],
            ))
            .unwrap();

        let frame = core.tick().unwrap();
        assert_eq!(frame.meta.commands_applied, 1);
        assert_eq!(frame.meta.commands_rejected, 0);

        // Second-to-last frame was edited, the tick slid it one slot back
        let edited = core.buffer().frame(SEQ_LENGTH - 3).unwrap();
        assert_eq!(edited.joint(0).unwrap(), &[9.0, 9.0, 9.0]);
        assert_eq!(edited.joint(1).unwrap(), &[9.0, 9.0, 9.0]);
        // Untouched frames keep the seed pose
        assert_all_close(core.buffer().frame(0).unwrap().as_slice(), 1.0);
    }

    /// Horizon-1 change composes onto the newest frame and lands one slot earlier
    #[test]
    fn test_change_builds_on_newest_frame() {
        // mean 3, std 2: normalized 1.0 predicts 5.0
        let mut core = support::core(&[1.0, 5.0], Box::new(ConstantModel(1.0)));
        let control = ControlDispatcher::for_skeleton(core.skeleton(), core.handle());

        let first = core.tick().unwrap();
        assert_all_close(&first.pose, 5.0);

        control
            .dispatch_raw(&RawCommand::new(
                CHANGE_JOINT_POS,
                vec![
                    ArgValue::Int(1),
                    ArgValue::Float(0.5),
                    ArgValue::Float(-1.0),
                    ArgValue::Float(2.0),
                ],
            ))
            .unwrap();
        core.tick().unwrap();

        let edited = core.buffer().frame(SEQ_LENGTH - 3).unwrap();
        assert_all_close(edited.joint(0).unwrap(), 1.0);
        let changed = edited.joint(1).unwrap();
        for (got, want) in changed.iter().zip([5.5, 4.0, 7.0]) {
            assert!((got - want).abs() < 1e-4, "got {changed:?}");
        }
    }

    /// select 0, window 0..seq_length, factor 1.0: the window becomes the
    /// reference verbatim and stays there
    #[test]
    fn test_full_window_blend_then_fixed_point() {
        let mut core = support::seeded_core(&[0.5, 2.0], 1, Box::new(WindowMeanModel));
        assert_all_close(core.buffer().frame(0).unwrap().as_slice(), 2.0);

        let handle = core.handle();
        handle.select_sequence(0).unwrap();
        handle
            .set_reference_window(0, Some(SEQ_LENGTH as i64))
            .unwrap();
        handle.set_blend_factor(1.0).unwrap();

        let frame = core.tick().unwrap();
        assert_eq!(frame.meta.commands_applied, 3);
        assert!(frame.meta.blend_resolved);
        assert_eq!(frame.meta.sequence_index, 0);
        assert_all_close(&frame.pose, 0.5);
        for i in 0..SEQ_LENGTH {
            assert_all_close(core.buffer().frame(i).unwrap().as_slice(), 0.5);
        }
    }

    #[test]
    fn test_invalid_joint_index_is_rejected_after_valid_ones() {
        let mut core = support::core(&[1.0, 5.0], Box::new(LastFrameModel));
        let control = ControlDispatcher::for_skeleton(core.skeleton(), core.handle());

        control
            .dispatch_raw(&RawCommand::new(
                SET_JOINT_POS,
                vec![
                    ArgValue::Int(0),
                    ArgValue::Int(7),
                    ArgValue::Float(9.0),
                    ArgValue::Float(9.0),
                    ArgValue::Float(9.0),
                ],
            ))
            .unwrap();

        let frame = core.tick().unwrap();
        assert_eq!(frame.meta.commands_applied, 0);
        assert_eq!(frame.meta.commands_rejected, 1);

        let edited = core.buffer().frame(SEQ_LENGTH - 3).unwrap();
        assert_eq!(edited.joint(0).unwrap(), &[9.0, 9.0, 9.0]);
        assert_eq!(edited.joint(1).unwrap(), &[1.0, 1.0, 1.0]);

        // The engine keeps ticking
        assert!(core.tick().is_ok());
    }

    #[test]
    fn test_malformed_command_never_reaches_engine() {
        let core = support::core(&[1.0], Box::new(LastFrameModel));
        let control = ControlDispatcher::for_skeleton(core.skeleton(), core.handle());

        // Three values and no joint index
        let raw = RawCommand::new(
            SET_JOINT_POS,
            vec![ArgValue::Float(1.0), ArgValue::Float(2.0), ArgValue::Float(3.0)],
        );
        assert!(control.dispatch_raw(&raw).is_err());
        assert_eq!(core.handle().pending(), 0);
        assert_eq!(control.snapshot().malformed, 1);
    }
}

#[cfg(test)]
mod control_e2e_tests {
    use std::time::Duration;

    use super::support::{self, assert_all_close};
    use control::{ControlDispatcher, UdpCommandListener};
    use synthesis_engine::{LastFrameModel, SynthesisHandle};
    use tokio::net::UdpSocket;
    use tokio::sync::watch;

    async fn wait_for_pending(handle: &SynthesisHandle, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.pending() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("commands did not arrive in time");
    }

    /// UDP datagram -> decoder -> queue -> next tick
    #[tokio::test]
    async fn test_udp_sequence_switch_applies_on_next_tick() {
        let mut core = support::core(&[1.0, 5.0], Box::new(LastFrameModel));
        let handle = core.handle();
        let control = ControlDispatcher::for_skeleton(core.skeleton(), handle.clone());
        let metrics = control.metrics();

        let listener = UdpCommandListener::bind("127.0.0.1:0", control, 2048)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = listener.spawn(stop_rx);

        let first = core.tick().unwrap();
        assert_eq!(first.meta.sequence_index, 0);
        assert_all_close(&first.pose, 1.0);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"not json", addr).await.unwrap();
        client
            .send_to(br#"{ "address": "/mocap/seqindex", "args": [1] }"#, addr)
            .await
            .unwrap();
        client
            .send_to(br#"{ "command": "set_blend_factor", "factor": 1.0 }"#, addr)
            .await
            .unwrap();
        wait_for_pending(&handle, 2).await;

        let switched = core.tick().unwrap();
        assert_eq!(switched.meta.commands_applied, 2);
        assert_eq!(switched.meta.sequence_index, 1);
        assert!(switched.meta.blend_resolved);
        assert_all_close(&switched.pose, 5.0);

        stop_tx.send(true).unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.forwarded, 2);
        assert_eq!(metrics.snapshot(), snapshot);
    }

    #[tokio::test]
    async fn test_channel_source_reinitializes_window() {
        let mut core = support::core(&[1.0, 5.0], Box::new(LastFrameModel));
        let handle = core.handle();
        let control = ControlDispatcher::for_skeleton(core.skeleton(), handle.clone());

        let (tx, rx) = async_channel::bounded(8);
        let task = control.spawn_channel_source(rx);
        tx.send(contracts::RawCommand::new(
            control::SEQ_INDEX,
            vec![contracts::ArgValue::Int(1)],
        ))
        .await
        .unwrap();
        tx.send(contracts::RawCommand::new(control::SEQ_INIT, vec![]))
            .await
            .unwrap();
        drop(tx);
        let snapshot = task.await.unwrap();
        assert_eq!(snapshot.forwarded, 2);

        let frame = core.tick().unwrap();
        // Reinitialize discards the pending blend
        assert!(!frame.meta.blend_resolved);
        assert_all_close(&frame.pose, 5.0);
    }
}

#[cfg(test)]
mod dispatch_e2e_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::support;
    use contracts::{SinkConfig, SinkType, SynthesizedFrame, TickFailurePolicy};
    use dispatcher::create_dispatcher;
    use observability::TickMetricsAggregator;
    use synthesis_engine::{StopReason, TickLoop, WindowMeanModel};
    use tokio::sync::{mpsc, watch};

    /// TickLoop -> Dispatcher -> FileSink (JSON lines)
    #[tokio::test]
    async fn test_tick_loop_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");

        let (tick_tx, tick_rx) = mpsc::channel::<SynthesizedFrame>(32);
        let sink_configs = vec![
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 32,
                params: HashMap::from([(
                    "path".to_string(),
                    path.to_string_lossy().into_owned(),
                )]),
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 32,
                params: HashMap::new(),
            },
        ];
        let dispatcher = create_dispatcher(sink_configs, tick_rx).await.unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        let dispatcher_task = dispatcher.spawn();

        let mut core = support::core(&[0.5], Box::new(WindowMeanModel));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Skip)
            .with_max_ticks(Some(6))
            .run(&mut core, tick_tx, stop_rx)
            .await;
        assert_eq!(report.ticks_ok, 6);
        assert_eq!(report.stop_reason, StopReason::TickLimit);

        let dispatch = tokio::time::timeout(Duration::from_secs(2), dispatcher_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dispatch.frames, 6);
        for (name, snapshot) in &dispatch.sinks {
            assert_eq!(snapshot.written, 6, "sink {name}");
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let frames: Vec<SynthesizedFrame> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            frames.iter().map(|f| f.tick_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5, 6]
        );

        let mut aggregator = TickMetricsAggregator::new();
        for frame in &frames {
            support::assert_all_close(&frame.pose, 0.5);
            aggregator.update(&frame.meta, frame.tick_id);
        }
        let summary = aggregator.summary();
        assert_eq!(summary.total_frames, 6);
        assert_eq!(summary.tick_gaps, 0);
        assert_eq!(summary.frames_per_sequence.get(&0), Some(&6));
    }

    /// The tick loop never blocks on a slow consumer
    #[tokio::test]
    async fn test_full_output_drops_frames() {
        let mut core = support::core(&[0.5], Box::new(WindowMeanModel));
        let (tick_tx, _tick_rx) = mpsc::channel::<SynthesizedFrame>(2);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let report = TickLoop::new(Duration::from_millis(1), TickFailurePolicy::Skip)
            .with_max_ticks(Some(5))
            .run(&mut core, tick_tx, stop_rx)
            .await;
        assert_eq!(report.ticks_ok, 5);
        assert_eq!(report.frames_dropped, 3);
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use synthesis_engine::{build_model, SequenceLibrary, SynthesisCore};

    const CONFIG: &str = r#"
[skeleton]
joint_dim = 4
channel = "rotation"
children = [[1, 2], [], []]

[engine]
seq_length = 8
fps = 60.0

[library]
sequence_count = 3
frames = 64

[model]
kind = "last_frame"

[control]
bind_addr = "127.0.0.1:0"

[[sinks]]
name = "log"
sink_type = "log"
"#;

    /// Config text -> blueprint -> running core
    #[test]
    fn test_blueprint_builds_running_core() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let skeleton = Arc::new(blueprint.skeleton.build().unwrap());
        let library = Arc::new(
            SequenceLibrary::synthetic(&skeleton, &blueprint.library, blueprint.engine.fps)
                .unwrap(),
        );
        assert_eq!(library.len(), 3);

        let mut core = SynthesisCore::new(
            skeleton,
            library,
            build_model(blueprint.model.kind),
            &blueprint.engine,
        )
        .unwrap();
        assert_eq!(core.model_name(), "last_frame");
        assert_eq!(core.edges(), &[(0, 1), (0, 2)]);

        let frame = core.tick().unwrap();
        assert_eq!(frame.joint_count, 3);
        assert_eq!(frame.joint_dim, 4);
        // Rotation output stays on the unit sphere
        for joint in 0..3 {
            let q = frame.joint(joint).unwrap();
            let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3, "joint {joint} norm {norm}");
        }
    }
}
