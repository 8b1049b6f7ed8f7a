//! # Control
//!
//! 控制面：把远程命令送进合成引擎。
//!
//! 负责：
//! - 解码原始命令 (`address` + 位置参数) 为 `ControlCommand`
//! - 通过 `SynthesisHandle` 投递到引擎命令队列 (队列满即丢弃并计数)
//! - UDP/JSON 与进程内通道两种命令来源
//!
//! ## 使用示例
//!
//! ```ignore
//! use control::{ControlDispatcher, UdpCommandListener};
//!
//! let dispatcher = ControlDispatcher::for_skeleton(&skeleton, core.handle());
//! let listener = UdpCommandListener::bind("0.0.0.0:9002", dispatcher, 65507).await?;
//! let control_task = listener.spawn(shutdown_rx.clone());
//! ```

mod decoder;
mod dispatcher;
mod error;
mod stats;
mod udp;

pub use decoder::{
    CommandDecoder, CHANGE_JOINT_POS, CHANGE_JOINT_ROT, SEQ_BLEND, SEQ_INDEX, SEQ_INIT, SEQ_INPUT,
    SET_JOINT_POS, SET_JOINT_ROT,
};
pub use dispatcher::ControlDispatcher;
pub use error::{ControlError, Result};
pub use stats::{ControlMetrics, ControlSnapshot};
pub use udp::UdpCommandListener;
