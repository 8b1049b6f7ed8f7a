//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration failed to load or validate
    #[error("Invalid configuration: {0}")]
    Config(#[from] contracts::SynthError),

    /// Control listener could not start
    #[error("Control listener failed: {0}")]
    Control(#[from] control::ControlError),

    /// Sink setup failed
    #[error("Dispatcher setup failed: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// A pipeline task died
    #[error("Pipeline task failed: {message}")]
    Task { message: String },
}

/// Process exit status for errors that are not a `CliError`
pub const EXIT_FAILURE: u8 = 1;

impl CliError {
    /// 2 for configuration problems, 3 for endpoints that failed to open
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::Config(_) => 2,
            Self::Control(_) | Self::Dispatcher(_) => 3,
            Self::Task { .. } => EXIT_FAILURE,
        }
    }

    pub fn config_not_found(path: &std::path::Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}
