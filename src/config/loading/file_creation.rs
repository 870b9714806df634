use crate::{AppError, Result, config::Config};
use std::{fs, path::Path};
use tracing::info;

/// Creates a configuration file holding the default settings
pub fn create_default_config_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::io(e, parent))?;
    }

    let defaults = toml::to_string_pretty(&Config::default())?;
    let content = format!("# AVRCP target configuration file\n\n{defaults}");

    fs::write(path, content).map_err(|e| AppError::io(e, path))?;
    info!("Created default configuration at {}", path.display());

    Ok(())
}
