//! FileSink - one JSON object per line

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Local;
use contracts::{FrameSink, SynthError, SynthesizedFrame};
use tracing::{info, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// `path` wins; otherwise `dir` (default `./output`) plus a timestamped file name
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = match params.get("path") {
            Some(path) => PathBuf::from(path),
            None => {
                let dir = params
                    .get("dir")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./output"));
                dir.join(format!("frames_{}.jsonl", Local::now().format("%Y%m%d_%H%M%S")))
            }
        };
        Self { path }
    }
}

/// Sink appending frames to a JSON-lines file
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl FileSink {
    /// Create the file (and parent directories)
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&config.path)?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, SynthError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params);
        let path = config.path.display().to_string();
        Self::new(name.clone(), config)
            .map_err(|e| SynthError::sink_write(name, format!("cannot create '{path}': {e}")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, SynthError> {
        self.writer
            .as_mut()
            .ok_or_else(|| SynthError::sink_write(&self.name, "file already closed"))
    }

    fn append(&mut self, frame: &SynthesizedFrame) -> Result<(), SynthError> {
        let name = self.name.clone();
        let writer = self.writer()?;
        serde_json::to_writer(&mut *writer, frame)
            .map_err(|e| SynthError::sink_write(&name, e.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| SynthError::sink_write(&name, e.to_string()))?;
        self.lines += 1;
        Ok(())
    }
}

impl FrameSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, tick_id = frame.tick_id)
    )]
    async fn write(&mut self, frame: &SynthesizedFrame) -> Result<(), SynthError> {
        self.append(frame)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), SynthError> {
        let name = self.name.clone();
        self.writer()?
            .flush()
            .map_err(|e| SynthError::sink_write(name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), SynthError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| SynthError::sink_write(&self.name, e.to_string()))?;
        }
        info!(sink = %self.name, path = %self.path.display(), lines = self.lines, "FileSink closed");
        Ok(())
    }
}
