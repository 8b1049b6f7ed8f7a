//! SynthesisBlueprint - Config Loader 输出
//!
//! 描述完整的运行配置：骨架拓扑、合成引擎、参考序列库、模型、控制通道、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{ChannelKind, EngineConfig, Skeleton, SynthError};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SynthesisBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 骨架拓扑
    #[validate(nested)]
    pub skeleton: SkeletonConfig,

    /// 合成引擎参数
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    /// 参考序列库
    #[serde(default)]
    #[validate(nested)]
    pub library: LibraryConfig,

    /// 预测模型
    #[serde(default)]
    pub model: ModelConfig,

    /// 远程控制通道
    #[serde(default)]
    pub control: ControlConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// 骨架配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SkeletonConfig {
    /// 每个关节的通道宽度 (2/3 = 位置, 4 = 四元数)
    #[validate(range(min = 2, max = 4, message = "joint_dim must be 2, 3 or 4"))]
    pub joint_dim: usize,

    /// 通道类型
    #[serde(default)]
    pub channel: ChannelKind,

    /// 子关节表：children[parent] = [child, ...]，长度即关节数
    #[validate(length(min = 1, message = "skeleton needs at least one joint"))]
    pub children: Vec<Vec<usize>>,

    /// 关节名称 (可选)
    #[serde(default)]
    pub names: Vec<String>,
}

impl SkeletonConfig {
    /// 构建 Skeleton
    pub fn build(&self) -> Result<Skeleton, SynthError> {
        let skeleton = Skeleton::from_children(&self.children, self.joint_dim, self.channel)?;
        if self.names.is_empty() {
            Ok(skeleton)
        } else {
            skeleton.with_names(self.names.clone())
        }
    }
}

/// 参考序列库配置
///
/// 运行时使用程序化生成的参考序列；录制文件的读取不在本项目范围内。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LibraryConfig {
    /// 序列数量
    #[serde(default = "default_sequence_count")]
    #[validate(range(min = 1, message = "library needs at least one sequence"))]
    pub sequence_count: usize,

    /// 每条序列的帧数
    #[serde(default = "default_frames")]
    #[validate(range(min = 1))]
    pub frames: usize,

    /// 运动幅度
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,

    /// 基础频率 (Hz)，第 n 条序列使用 (n+1) 倍频率
    #[serde(default = "default_frequency")]
    #[validate(range(exclusive_min = 0.0))]
    pub frequency_hz: f32,
}

fn default_sequence_count() -> usize {
    2
}

fn default_frames() -> usize {
    512
}

fn default_amplitude() -> f32 {
    1.0
}

fn default_frequency() -> f32 {
    0.5
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            sequence_count: default_sequence_count(),
            frames: default_frames(),
            amplitude: default_amplitude(),
            frequency_hz: default_frequency(),
        }
    }
}

/// 模型配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// 内置模型类型
    #[serde(default)]
    pub kind: ModelKind,
}

/// 内置模型类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// 窗口列均值
    #[default]
    WindowMean,
    /// 保持最后一帧
    LastFrame,
    /// 最后两帧线性外推
    LinearExtrapolation,
}

/// 控制通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// 是否启用 UDP 控制监听
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 监听地址
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// 最大数据报长度
    #[serde(default = "default_max_datagram")]
    pub max_datagram_size: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:9002".to_string()
}

fn default_max_datagram() -> usize {
    65507
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind_addr: default_bind_addr(),
            max_datagram_size: default_max_datagram(),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (JSON lines)
    File,
    /// 网络输出 (UDP)
    Network,
}
