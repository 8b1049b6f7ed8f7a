//! # Dispatcher
//!
//! 合成帧分发模块。
//!
//! 负责：
//! - 消费 TickLoop 输出的 `SynthesizedFrame`
//! - Fan-out 到多个 sinks (log / JSON-lines 文件 / UDP)
//! - 每个 sink 独立队列，慢 sink 只丢自己的帧，不阻塞 tick

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{FrameSink, SynthesizedFrame};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::{Offer, SinkHandle};
pub use metrics::{FrameOutcome, MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkFormat, NetworkSink, NetworkSinkConfig};
