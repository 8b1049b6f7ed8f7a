//! # Synthesis Engine
//!
//! 自回归动作合成引擎。
//!
//! 负责：
//! - 参考序列库与归一化统计
//! - 固定长度滑动窗口 (`MotionBuffer`)
//! - 参考混合 (`BlendEngine`) 与关节覆写 (`OverrideEngine`)
//! - 单步推理 (`InferenceStep`)
//! - 按帧率驱动的 `TickLoop`，输出 `SynthesizedFrame`
//!
//! ## 使用示例
//!
//! ```ignore
//! use synthesis_engine::{build_model, SequenceLibrary, SynthesisCore, TickLoop};
//!
//! let library = Arc::new(SequenceLibrary::synthetic(&skeleton, &blueprint.library, 30.0)?);
//! let mut core = SynthesisCore::new(skeleton, library, build_model(kind), &blueprint.engine)?;
//!
//! // Control side
//! let handle = core.handle();
//! handle.set_blend_factor(0.5)?;
//!
//! // Tick side
//! let report = TickLoop::from_config(&blueprint.engine)
//!     .run(&mut core, frame_tx, shutdown_rx)
//!     .await;
//! ```

mod algebra;
mod blend;
mod buffer;
mod engine;
mod handle;
mod inference;
mod library;
mod models;
mod overrides;
mod runner;

pub use algebra::{axis_angle_to_quaternion, PoseAlgebra};
pub use blend::{
    clamp_blend_factor, clamp_frame_count, clamp_start_frame, BlendEngine, BlendState,
};
pub use buffer::MotionBuffer;
pub use engine::{CoreState, DrainReport, SynthesisCore};
pub use handle::SynthesisHandle;
pub use inference::InferenceStep;
pub use library::{NormalizationStats, PoseSequence, SequenceLibrary};
pub use models::{build_model, LastFrameModel, LinearExtrapolationModel, WindowMeanModel};
pub use overrides::{target_frames, OverrideEngine, ResolvedOverride};
pub use runner::{StopReason, TickLoop, TickLoopReport};

// Re-export contracts types
pub use contracts::{EngineConfig, SynthesizedFrame, TickFailurePolicy, TickMeta};
