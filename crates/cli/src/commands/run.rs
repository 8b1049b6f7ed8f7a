//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigFormat;
use contracts::SynthesisBlueprint;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut blueprint, args);
    // overrides bypass the loader, so check the result again
    config_loader::validate(&blueprint)
        .map_err(CliError::from)
        .context("Invalid configuration after CLI overrides")?;

    info!(
        joints = blueprint.skeleton.children.len(),
        seq_length = blueprint.engine.seq_length,
        fps = blueprint.engine.fps,
        model = ?blueprint.model.kind,
        control = blueprint.control.enabled,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        let effective = config_loader::ConfigLoader::render(&blueprint, ConfigFormat::Toml)
            .map_err(CliError::from)?;
        debug!("effective configuration:\n{effective}");
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    // The sender lives in the signal task for the whole run
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, finishing current tick...");
        let _ = shutdown_tx.send(true);
        // keep the sender alive until the pipeline is done with it
        std::future::pending::<()>().await;
    });

    info!("Starting engine...");
    let result = pipeline.run(shutdown_rx).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    info!(
        frames = stats.ticks.ticks_ok,
        failed = stats.ticks.ticks_failed,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Engine stopped"
    );
    stats.print_summary();

    info!("mocap-synth finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut SynthesisBlueprint, args: &RunArgs) {
    if let Some(fps) = args.fps {
        info!(fps, "Overriding fps from CLI");
        blueprint.engine.fps = fps;
    }
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding control bind address from CLI");
        blueprint.control.bind_addr = bind.clone();
    }
    if args.no_control {
        blueprint.control.enabled = false;
    }
    if let Some(model) = args.model {
        blueprint.model.kind = model.into();
    }
    if args.max_ticks > 0 {
        blueprint.engine.max_ticks = Some(args.max_ticks);
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SynthesisBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Skeleton:");
    println!(
        "  {} joints x {} ({:?})",
        blueprint.skeleton.children.len(),
        blueprint.skeleton.joint_dim,
        blueprint.skeleton.channel
    );
    println!("\nEngine:");
    println!(
        "  window {} frames @ {} fps, model {:?}",
        blueprint.engine.seq_length, blueprint.engine.fps, blueprint.model.kind
    );
    if let Some(max) = blueprint.engine.max_ticks {
        println!("  stops after {max} ticks");
    }
    println!(
        "\nReference library: {} sequences x {} frames",
        blueprint.library.sequence_count, blueprint.library.frames
    );
    if blueprint.control.enabled {
        println!("\nControl: udp://{}", blueprint.control.bind_addr);
    } else {
        println!("\nControl: disabled");
    }
    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModelArg;
    use contracts::ModelKind;

    fn args() -> RunArgs {
        RunArgs {
            config: "synth.toml".into(),
            fps: Some(60.0),
            bind: Some("127.0.0.1:7000".into()),
            no_control: false,
            model: Some(ModelArg::LinearExtrapolation),
            max_ticks: 100,
            timeout: 0,
            dry_run: false,
            buffer_size: 64,
            metrics_port: 0,
        }
    }

    #[test]
    fn overrides_are_applied() {
        let mut blueprint = config_loader::ConfigLoader::load_from_str(
            "[skeleton]\njoint_dim = 3\nchildren = [[]]\n[engine]\nseq_length = 4\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        apply_overrides(&mut blueprint, &args());

        assert_eq!(blueprint.engine.fps, 60.0);
        assert_eq!(blueprint.engine.max_ticks, Some(100));
        assert_eq!(blueprint.control.bind_addr, "127.0.0.1:7000");
        assert_eq!(blueprint.model.kind, ModelKind::LinearExtrapolation);
        assert!(config_loader::validate(&blueprint).is_ok());

        let mut bad = args();
        bad.fps = Some(0.0);
        apply_overrides(&mut blueprint, &bad);
        assert!(config_loader::validate(&blueprint).is_err());
    }
}
