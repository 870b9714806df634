mod file_creation;

use super::{Config, ConfigPaths};
use crate::{AppError, Result};
use file_creation::create_default_config_file;
use std::{fs, path::Path};
use tracing::{debug, instrument};

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be resolved
    /// or the file cannot be loaded (see [`Config::load_from`]).
    pub fn load() -> Result<Config> {
        let path = ConfigPaths::main_config()?;
        Self::load_from(&path)
    }

    /// Loads a configuration file, creating it with defaults when missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The default configuration file cannot be created
    /// - The configuration file cannot be read
    /// - The TOML content is invalid
    /// - The parsed values fail validation
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            create_default_config_file(path)?;
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::io(e, path))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| AppError::toml_parse(e, Some(path)))?;

        config.validate()?;
        debug!("Loaded configuration");

        Ok(config)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the values fail validation.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content).map_err(|e| AppError::toml_parse(e, None))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.players.folder_cache_size == 0 {
            return Err(AppError::ConfigValidation {
                component: "players".to_string(),
                details: "folder_cache_size must be at least 1".to_string(),
            });
        }

        if self.players.playback_timeout_ms == 0 {
            return Err(AppError::ConfigValidation {
                component: "players".to_string(),
                details: "playback_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.players.browse_timeout_ms == 0 {
            return Err(AppError::ConfigValidation {
                component: "players".to_string(),
                details: "browse_timeout_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
