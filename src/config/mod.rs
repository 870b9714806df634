//! Configuration schema definitions and loading.
//!
//! Defines the complete configuration structure for the AVRCP target
//! service: general settings such as logging and the tunables of the
//! player list. All configurations are serializable to/from TOML format.

mod general;
mod loading;
mod paths;
mod players;

#[cfg(test)]
mod tests;

pub use general::{GeneralConfig, LogLevel};
pub use paths::ConfigPaths;
pub use players::PlayersConfig;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// Represents the complete configuration schema that can be loaded
/// from TOML files. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Player list, browse tree and timeout settings.
    #[serde(default)]
    pub players: PlayersConfig,
}
