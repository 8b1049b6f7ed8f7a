//! FrameSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{SynthError, SynthesizedFrame};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one synthesized frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, frame: &SynthesizedFrame) -> Result<(), SynthError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), SynthError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), SynthError>;
}
