//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use contracts::SynthesisBlueprint;

use crate::error::CliError;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load and validate a blueprint, distinguishing a missing file
pub(crate) fn load_blueprint(path: &Path) -> Result<SynthesisBlueprint, CliError> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
