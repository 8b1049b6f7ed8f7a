//! 配置解析模块
//!
//! TOML 为主，JSON 用于机器生成的配置。解析只负责结构，范围检查在 validator。

use contracts::{SynthError, SynthesisBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式 (大小写不敏感)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 按格式反序列化为 `SynthesisBlueprint`
///
/// 编辑器写入的 UTF-8 BOM 会被忽略。
pub fn parse(content: &str, format: ConfigFormat) -> Result<SynthesisBlueprint, SynthError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(format, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(format, e)),
    }
}

fn parse_error<E>(format: ConfigFormat, error: E) -> SynthError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SynthError::ConfigParse {
        message: format!("{} parse error: {error}", format.name()),
        source: Some(Box::new(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelKind, ModelKind, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[skeleton]
joint_dim = 4
channel = "rotation"
children = [[1, 2], [], []]

[engine]
seq_length = 32
fps = 60.0

[model]
kind = "last_frame"

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.skeleton.channel, ChannelKind::Rotation);
        assert_eq!(bp.skeleton.children.len(), 3);
        assert_eq!(bp.engine.seq_length, 32);
        assert_eq!(bp.model.kind, ModelKind::LastFrame);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "skeleton": { "joint_dim": 3, "children": [[1], []] },
            "engine": { "seq_length": 16, "failure_policy": "halt" },
            "control": { "bind_addr": "127.0.0.1:9100" },
            "sinks": [{ "name": "out", "sink_type": "file", "params": { "path": "frames.jsonl" } }]
        }"#;
        let result = parse(content, ConfigFormat::Json);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.control.bind_addr, "127.0.0.1:9100");
        assert_eq!(bp.sinks[0].params["path"], "frames.jsonl");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_missing_skeleton() {
        let result = parse("[engine]\nfps = 30.0\n", ConfigFormat::Toml);
        assert!(matches!(result, Err(SynthError::ConfigParse { .. })));
    }

    #[test]
    fn test_bom_is_ignored() {
        let content = "\u{feff}[skeleton]\njoint_dim = 3\nchildren = [[]]\n";
        let bp = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.skeleton.joint_dim, 3);
    }

    #[test]
    fn test_error_names_format() {
        let err = parse("{", ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("JSON parse error"), "got: {err}");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
