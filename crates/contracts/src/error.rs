//! Layered error definitions
//!
//! Categorized by source: config / model data / control / inference / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum SynthError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Motion Data Errors =====
    /// Skeleton topology is inconsistent
    #[error("invalid skeleton: {message}")]
    InvalidSkeleton { message: String },

    /// Reference library cannot back the configured window
    #[error("invalid sequence library: {message}")]
    InvalidLibrary { message: String },

    // ===== Control Errors =====
    /// Command with an unexpected shape (argument count, value width, address)
    #[error("malformed command '{address}': {reason}")]
    MalformedCommand { address: String, reason: String },

    /// Override addressed joints outside the skeleton
    #[error("invalid joint indices {indices:?} (joint_count={joint_count})")]
    InvalidJointIndex {
        indices: Vec<i64>,
        joint_count: usize,
    },

    /// Command queue between control and tick context is full
    #[error("command queue full, '{command}' dropped")]
    QueueFull { command: String },

    /// Command queue between control and tick context is gone
    #[error("command queue closed")]
    QueueClosed,

    // ===== Inference Errors =====
    /// Model call failed or produced an unusable shape
    #[error("inference failure: {message}")]
    InferenceFailure { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl SynthError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_skeleton(message: impl Into<String>) -> Self {
        Self::InvalidSkeleton {
            message: message.into(),
        }
    }

    pub fn invalid_library(message: impl Into<String>) -> Self {
        Self::InvalidLibrary {
            message: message.into(),
        }
    }

    /// Create malformed command diagnostic
    pub fn malformed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create inference failure
    pub fn inference(message: impl Into<String>) -> Self {
        Self::InferenceFailure {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Short, stable label used for metrics and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "config_parse",
            Self::ConfigValidation { .. } => "config_validation",
            Self::InvalidSkeleton { .. } => "invalid_skeleton",
            Self::InvalidLibrary { .. } => "invalid_library",
            Self::MalformedCommand { .. } => "malformed_command",
            Self::InvalidJointIndex { .. } => "invalid_joint_index",
            Self::QueueFull { .. } => "queue_full",
            Self::QueueClosed => "queue_closed",
            Self::InferenceFailure { .. } => "inference_failure",
            Self::SinkWrite { .. } => "sink_write",
            Self::SinkConnection { .. } => "sink_connection",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
