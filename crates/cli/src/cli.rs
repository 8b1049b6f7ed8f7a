//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::ModelKind;
use std::path::PathBuf;

/// mocap-synth - live autoregressive motion synthesis with remote control
#[derive(Parser, Debug)]
#[command(
    name = "mocap-synth",
    author,
    version,
    about = "Live autoregressive motion synthesis engine",
    long_about = "Runs a sliding-window pose generator at a fixed frame rate.\n\n\
                  Remote UDP commands blend the window toward reference sequences \n\
                  or pin individual joints; frames are fanned out to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MOCAP_SYNTH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MOCAP_SYNTH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter used when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synthesis engine
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "synth.toml", env = "MOCAP_SYNTH_CONFIG")]
    pub config: PathBuf,

    /// Override the output frame rate
    #[arg(long, env = "MOCAP_SYNTH_FPS")]
    pub fps: Option<f64>,

    /// Override the control listener address
    #[arg(long, env = "MOCAP_SYNTH_BIND")]
    pub bind: Option<String>,

    /// Disable the UDP control listener
    #[arg(long)]
    pub no_control: bool,

    /// Override the prediction model
    #[arg(long, value_enum)]
    pub model: Option<ModelArg>,

    /// Stop after this many ticks (0 = use config / unlimited)
    #[arg(long, default_value = "0", env = "MOCAP_SYNTH_MAX_TICKS")]
    pub max_ticks: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "MOCAP_SYNTH_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Frame channel size between tick loop and dispatcher
    #[arg(long, default_value = "64", env = "MOCAP_SYNTH_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "MOCAP_SYNTH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "synth.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "synth.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List skeleton joints and edges
    #[arg(long)]
    pub skeleton: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Built-in prediction models
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModelArg {
    WindowMean,
    LastFrame,
    LinearExtrapolation,
}

impl From<ModelArg> for ModelKind {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::WindowMean => Self::WindowMean,
            ModelArg::LastFrame => Self::LastFrame,
            ModelArg::LinearExtrapolation => Self::LinearExtrapolation,
        }
    }
}
