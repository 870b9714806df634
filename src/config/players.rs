use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Player list configuration.
///
/// Tunables for the aggregated browse tree, the folder cache, the
/// browse, playback and metadata timeouts and the diagnostic event logs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PlayersConfig {
    /// Name reported to the remote device for the aggregate player.
    pub aggregate_player_name: String,

    /// Number of folders cached per browsable player.
    pub folder_cache_size: usize,

    /// How long to wait for a browsed item to start playing, in milliseconds.
    pub playback_timeout_ms: u64,

    /// How long a browse service may take to connect, list a folder or accept
    /// a play request, in milliseconds.
    pub browse_timeout_ms: u64,

    /// How long an update may wait for metadata and queue to agree, in milliseconds.
    pub metadata_sync_timeout_ms: u64,

    /// Number of active player changes kept for diagnostics.
    pub active_player_log_size: usize,

    /// Number of external audio playback changes kept for diagnostics.
    pub audio_playback_log_size: usize,

    /// Package name patterns that are never registered as players.
    pub ignored_packages: Vec<String>,
}

impl PlayersConfig {
    /// Playback start timeout as a [`Duration`].
    pub fn playback_timeout(&self) -> Duration {
        Duration::from_millis(self.playback_timeout_ms)
    }

    /// Browse service call timeout as a [`Duration`].
    pub fn browse_timeout(&self) -> Duration {
        Duration::from_millis(self.browse_timeout_ms)
    }

    /// Metadata sync timeout as a [`Duration`].
    pub fn metadata_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_sync_timeout_ms)
    }

    /// Whether a package matches one of the ignored patterns.
    pub fn is_ignored(&self, package_name: &str) -> bool {
        self.ignored_packages
            .iter()
            .any(|pattern| package_name.contains(pattern.as_str()))
    }
}

impl Default for PlayersConfig {
    fn default() -> Self {
        Self {
            aggregate_player_name: "Bluetooth Player".to_string(),
            folder_cache_size: 5,
            playback_timeout_ms: 5000,
            browse_timeout_ms: 5000,
            metadata_sync_timeout_ms: 1000,
            active_player_log_size: 5,
            audio_playback_log_size: 15,
            ignored_packages: Vec::new(),
        }
    }
}
