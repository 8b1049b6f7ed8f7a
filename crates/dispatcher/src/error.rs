//! Dispatcher error types

use contracts::{SinkConfig, SinkType, SynthError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A sink could not be built from its params
    #[error("{sink_type:?} sink '{name}' could not be created: {source}")]
    SinkCreation {
        name: String,
        sink_type: SinkType,
        #[source]
        source: SynthError,
    },
}

impl DispatcherError {
    pub fn sink_creation(config: &SinkConfig, source: SynthError) -> Self {
        Self::SinkCreation {
            name: config.name.clone(),
            sink_type: config.sink_type,
            source,
        }
    }

    /// Name of the sink that failed
    pub fn sink_name(&self) -> &str {
        match self {
            Self::SinkCreation { name, .. } => name,
        }
    }
}
