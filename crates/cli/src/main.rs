//! # mocap-synth CLI
//!
//! 命令行入口：加载配置、启动合成管道、处理退出码。
//!
//! 退出码：0 成功，1 运行失败，2 配置错误，3 控制/输出端点无法打开。

mod cli;
mod commands;
mod error;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};
use error::{CliError, EXIT_FAILURE};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: cli.default_log_level().to_string(),
    }) {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::from(EXIT_FAILURE);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "mocap-synth starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// First `CliError` in the chain decides the status
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CliError>())
        .map_or(EXIT_FAILURE, CliError::exit_code)
}
