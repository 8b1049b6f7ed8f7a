//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive：joint_dim、seq_length、fps、sink 名称 ...)
//! - 骨架拓扑合法 (子关节索引 < 关节数)，通道类型与 joint_dim 匹配
//! - 参考序列长度 >= seq_length，初始序列索引在范围内
//! - sink 名称唯一，network sink 目标地址合法
//! - 控制监听地址合法

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{SinkType, SynthError, SynthesisBlueprint};
use validator::Validate;

/// 校验 SynthesisBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    validate_fields(blueprint)?;
    validate_skeleton(blueprint)?;
    validate_library(blueprint)?;
    validate_control(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段级校验 (derive)
fn validate_fields(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    blueprint.validate().map_err(|e| {
        let field = e
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        SynthError::config_validation(field, e.to_string())
    })
}

/// 校验骨架拓扑与通道类型
fn validate_skeleton(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    let skeleton = &blueprint.skeleton;
    if !skeleton.channel.accepts_joint_dim(skeleton.joint_dim) {
        return Err(SynthError::config_validation(
            "skeleton.joint_dim",
            format!(
                "joint_dim {} is not valid for {:?} channels",
                skeleton.joint_dim, skeleton.channel
            ),
        ));
    }

    skeleton
        .build()
        .map(|_| ())
        .map_err(|e| SynthError::config_validation("skeleton", e.to_string()))
}

/// 校验参考序列库能支撑滑动窗口
fn validate_library(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    let library = &blueprint.library;
    let engine = &blueprint.engine;

    if library.frames < engine.seq_length {
        return Err(SynthError::config_validation(
            "library.frames",
            format!(
                "sequences have {} frames, seq_length needs at least {}",
                library.frames, engine.seq_length
            ),
        ));
    }

    if engine.initial_sequence >= library.sequence_count {
        return Err(SynthError::config_validation(
            "engine.initial_sequence",
            format!(
                "initial_sequence {} out of range ({} sequences)",
                engine.initial_sequence, library.sequence_count
            ),
        ));
    }

    if !library.amplitude.is_finite() {
        return Err(SynthError::config_validation(
            "library.amplitude",
            "amplitude must be finite",
        ));
    }

    Ok(())
}

/// 校验控制监听地址
fn validate_control(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    let control = &blueprint.control;
    if !control.enabled {
        return Ok(());
    }
    control.bind_addr.parse::<SocketAddr>().map_err(|e| {
        SynthError::config_validation(
            "control.bind_addr",
            format!("invalid address '{}': {e}", control.bind_addr),
        )
    })?;
    if control.max_datagram_size == 0 {
        return Err(SynthError::config_validation(
            "control.max_datagram_size",
            "must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &SynthesisBlueprint) -> Result<(), SynthError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(SynthError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(SynthError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.sink_type == SinkType::Network {
            let addr = sink.params.get("addr").ok_or_else(|| {
                SynthError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    "network sink requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                SynthError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    format!("invalid address '{addr}': {e}"),
                )
            })?;
        }
    }
    Ok(())
}
