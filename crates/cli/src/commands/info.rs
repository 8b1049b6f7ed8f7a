//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{ChannelKind, ModelKind, SinkType, SynthesisBlueprint, TickFailurePolicy};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    skeleton: SkeletonInfo,
    engine: EngineInfo,
    model: ModelKind,
    control: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SkeletonInfo {
    joint_count: usize,
    joint_dim: usize,
    channel: ChannelKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    joints: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    edges: Vec<(usize, usize)>,
}

#[derive(Serialize)]
struct EngineInfo {
    seq_length: usize,
    fps: f64,
    initial_sequence: usize,
    sequences: usize,
    frames_per_sequence: usize,
    command_queue_capacity: usize,
    failure_policy: TickFailurePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_ticks: Option<u64>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: SinkType,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&blueprint, args)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&info);
    }
    Ok(())
}

fn build_config_info(blueprint: &SynthesisBlueprint, args: &InfoArgs) -> Result<ConfigInfo> {
    let skeleton = blueprint.skeleton.build()?;

    let (joints, edges) = if args.skeleton {
        let joints = (0..skeleton.joint_count())
            .map(|i| {
                skeleton
                    .joint_name(i)
                    .map_or_else(|| format!("joint_{i}"), str::to_string)
            })
            .collect();
        (joints, skeleton.edges().to_vec())
    } else {
        (Vec::new(), Vec::new())
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: s.sink_type,
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let engine = &blueprint.engine;
    Ok(ConfigInfo {
        version: format!("{:?}", blueprint.version),
        skeleton: SkeletonInfo {
            joint_count: skeleton.joint_count(),
            joint_dim: skeleton.joint_dim(),
            channel: skeleton.channel(),
            joints,
            edges,
        },
        engine: EngineInfo {
            seq_length: engine.seq_length,
            fps: engine.fps,
            initial_sequence: engine.initial_sequence,
            sequences: blueprint.library.sequence_count,
            frames_per_sequence: blueprint.library.frames,
            command_queue_capacity: engine.command_queue_capacity,
            failure_policy: engine.failure_policy,
            max_ticks: engine.max_ticks,
        },
        model: blueprint.model.kind,
        control: blueprint
            .control
            .enabled
            .then(|| blueprint.control.bind_addr.clone()),
        sinks,
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("mocap-synth configuration ({})", info.version);

    let sk = &info.skeleton;
    println!("\nSkeleton");
    println!("   ├─ Joints: {}", sk.joint_count);
    println!("   ├─ Joint dim: {}", sk.joint_dim);
    println!("   └─ Channel: {:?}", sk.channel);
    if !sk.joints.is_empty() {
        println!("   Joints:");
        for (i, name) in sk.joints.iter().enumerate() {
            println!("     {i:>3} {name}");
        }
        println!("   Edges ({}):", sk.edges.len());
        for (parent, child) in &sk.edges {
            println!("     {parent} -> {child}");
        }
    }

    let e = &info.engine;
    println!("\nEngine");
    println!("   ├─ Window: {} frames @ {} fps", e.seq_length, e.fps);
    println!(
        "   ├─ Reference: {} sequences x {} frames (start #{})",
        e.sequences, e.frames_per_sequence, e.initial_sequence
    );
    println!("   ├─ Command queue: {}", e.command_queue_capacity);
    println!("   ├─ On tick failure: {:?}", e.failure_policy);
    match e.max_ticks {
        Some(max) => println!("   └─ Max ticks: {max}"),
        None => println!("   └─ Max ticks: unlimited"),
    }

    println!("\nModel: {:?}", info.model);
    match &info.control {
        Some(addr) => println!("Control: udp://{addr}"),
        None => println!("Control: disabled"),
    }

    if !info.sinks.is_empty() {
        println!("\nSinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i + 1 == info.sinks.len() { "└─" } else { "├─" };
            println!(
                "   {prefix} {} ({:?}, queue {})",
                sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skeleton_listing_uses_names_or_indices() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[skeleton]
joint_dim = 2
children = [[1, 2], [], []]
names = ["root", "a", "b"]

[engine]
seq_length = 4
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            skeleton: true,
            sinks: false,
        };
        let info = build_config_info(&blueprint, &args).unwrap();
        assert_eq!(info.skeleton.joints, vec!["root", "a", "b"]);
        assert_eq!(info.skeleton.edges, vec![(0, 1), (0, 2)]);
        assert_eq!(info.control.as_deref(), Some("0.0.0.0:9002"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["engine"]["seq_length"], 4);
    }
}
