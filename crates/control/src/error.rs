//! Control 错误类型

use thiserror::Error;

use contracts::SynthError;

/// Control 错误
#[derive(Debug, Error)]
pub enum ControlError {
    /// 数据报不是合法的 JSON 命令
    #[error("undecodable datagram: {message}")]
    Datagram {
        /// 错误消息
        message: String,
    },

    /// 命令被引擎拒绝 (格式错误、关节索引越界、队列满 ...)
    #[error(transparent)]
    Rejected(#[from] SynthError),

    /// 监听地址绑定失败
    #[error("failed to bind control socket on {addr}: {source}")]
    Bind {
        /// 监听地址
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 套接字读写错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// 用于指标标签的简短分类
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Datagram { .. } => "datagram",
            Self::Rejected(e) => e.kind(),
            Self::Bind { .. } => "bind",
            Self::Io(_) => "io",
        }
    }
}

/// Control Result 类型别名
pub type Result<T> = std::result::Result<T, ControlError>;
