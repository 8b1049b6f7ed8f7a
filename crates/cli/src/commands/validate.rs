//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ChannelKind, SynthesisBlueprint};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    joint_count: usize,
    joint_dim: usize,
    channel: ChannelKind,
    seq_length: usize,
    fps: f64,
    sequences: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                joint_count: blueprint.skeleton.children.len(),
                joint_dim: blueprint.skeleton.joint_dim,
                channel: blueprint.skeleton.channel,
                seq_length: blueprint.engine.seq_length,
                fps: blueprint.engine.fps,
                sequences: blueprint.library.sequence_count,
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(blueprint: &SynthesisBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - synthesized frames will be discarded".to_string());
    }
    if !blueprint.control.enabled {
        warnings.push("Control listener disabled - the engine runs unsteered".to_string());
    }
    if blueprint.library.frames == blueprint.engine.seq_length {
        warnings.push(
            "library.frames equals seq_length - reference start frame is pinned to 0".to_string(),
        );
    }
    if blueprint.engine.fps > 240.0 {
        warnings.push(format!(
            "engine.fps {} is high - ticks will likely overrun",
            blueprint.engine.fps
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if !result.valid {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
        return;
    }

    println!("✓ Configuration is valid: {}", result.config_path);
    if let Some(ref summary) = result.summary {
        println!("\n  Version: {}", summary.version);
        println!(
            "  Skeleton: {} joints x {} ({:?})",
            summary.joint_count, summary.joint_dim, summary.channel
        );
        println!("  Window: {} frames @ {} fps", summary.seq_length, summary.fps);
        println!("  Reference sequences: {}", summary.sequences);
        println!("  Sinks: {}", summary.sink_count);
    }
    if !result.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_config_reports_warnings() {
        let file = config_file(
            r#"
[skeleton]
joint_dim = 3
children = [[1], []]

[engine]
seq_length = 8

[library]
frames = 8

[control]
enabled = false
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        assert_eq!(result.summary.as_ref().unwrap().joint_count, 2);
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn missing_file_is_invalid() {
        let result = validate_config(&ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn semantic_errors_are_reported() {
        let file = config_file(
            r#"
[skeleton]
joint_dim = 3
channel = "rotation"
children = [[]]
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(!result.valid);
    }
}
