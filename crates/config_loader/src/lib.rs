//! # Config Loader
//!
//! Reads a `SynthesisBlueprint` from TOML or JSON and checks that the
//! skeleton, window, reference library, control endpoint and sinks fit
//! together before any engine is built.
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("synth.toml")).unwrap();
//! println!("window: {} frames", blueprint.engine.seq_length);
//! ```

mod parser;
mod validator;

pub use contracts::SynthesisBlueprint;
pub use parser::ConfigFormat;
pub use self::validator::validate;

use contracts::SynthError;
use std::path::Path;

/// Blueprint loading entry points
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a blueprint; the extension picks the format
    pub fn load_from_path(path: &Path) -> Result<SynthesisBlueprint, SynthError> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse then validate; a blueprint that parses but cannot drive an
    /// engine is still an error
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SynthesisBlueprint, SynthError> {
        let blueprint = parser::parse(content, format)?;
        validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize a blueprint; the text loads back to an equal blueprint
    pub fn render(
        blueprint: &SynthesisBlueprint,
        format: ConfigFormat,
    ) -> Result<String, SynthError> {
        let rendered = match format {
            ConfigFormat::Toml => toml::to_string_pretty(blueprint).map_err(|e| e.to_string()),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(blueprint).map_err(|e| e.to_string())
            }
        };
        rendered.map_err(|e| {
            SynthError::config_parse(format!("cannot render {} config: {e}", format.name()))
        })
    }
}

fn format_of(path: &Path) -> Result<ConfigFormat, SynthError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            SynthError::config_parse(format!("{} has no file extension", path.display()))
        })?;
    ConfigFormat::from_extension(ext)
        .ok_or_else(|| SynthError::config_parse(format!("unsupported config format: .{ext}")))
}
