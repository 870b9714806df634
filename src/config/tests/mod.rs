//! Unit tests for config module
//!
//! Tests configuration types, defaults, and serialization.
//! No filesystem dependencies - all in-memory.

#![allow(clippy::unwrap_used)]

use crate::config::{Config, LogLevel, PlayersConfig};

#[test]
fn config_default() {
    let config = Config::default();

    assert_eq!(config.general.log_level, LogLevel::Info);
    assert_eq!(config.players.folder_cache_size, 5);
    assert_eq!(config.players.playback_timeout_ms, 5000);
    assert_eq!(config.players.browse_timeout_ms, 5000);
    assert_eq!(config.players.aggregate_player_name, "Bluetooth Player");
}

#[test]
fn config_serialize_toml() {
    let config = Config::default();

    let toml_str = config.to_toml_string().unwrap();
    assert!(toml_str.contains("[general]"));
    assert!(toml_str.contains("[players]"));
}

#[test]
fn config_serialize_roundtrip() {
    let original = Config::default();

    let toml_str = toml::to_string(&original).unwrap();
    let deserialized: Config = toml::from_str(&toml_str).unwrap();

    assert_eq!(original, deserialized);
}

#[test]
fn config_partial_players_section() {
    let config = Config::from_toml_str(
        r#"
        [general]
        log_level = "debug"

        [players]
        folder_cache_size = 8
        ignored_packages = ["com.example.podcast"]
    "#,
    )
    .unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert_eq!(config.players.folder_cache_size, 8);
    assert_eq!(config.players.playback_timeout_ms, 5000);
    assert!(config.players.is_ignored("com.example.podcast.player"));
    assert!(!config.players.is_ignored("com.example.music"));
}

#[test]
fn config_empty_toml() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn config_rejects_zero_cache_size() {
    let result = Config::from_toml_str(
        r#"
        [players]
        folder_cache_size = 0
    "#,
    );

    assert!(result.is_err());
}

#[test]
fn config_rejects_zero_browse_timeout() {
    let result = Config::from_toml_str(
        r#"
        [players]
        browse_timeout_ms = 0
    "#,
    );

    assert!(result.is_err());
}

#[test]
fn config_browse_timeout_duration() {
    let config = Config::from_toml_str(
        r#"
        [players]
        browse_timeout_ms = 1500
    "#,
    )
    .unwrap();

    assert_eq!(config.players.browse_timeout(), std::time::Duration::from_millis(1500));
}

#[test]
fn config_invalid_toml() {
    let result = Config::from_toml_str(
        r#"
        [general
        invalid syntax here
    "#,
    );

    assert!(result.is_err());
}

#[test]
fn config_unknown_fields() {
    let config = Config::from_toml_str(
        r#"
        [general]
        log_level = "warn"
        unknown_field = "should be ignored"

        [unknown_section]
        some_field = "ignored"
    "#,
    )
    .unwrap();

    assert_eq!(config.general.log_level, LogLevel::Warn);
}

#[test]
fn players_config_durations() {
    let players = PlayersConfig {
        playback_timeout_ms: 250,
        metadata_sync_timeout_ms: 40,
        ..PlayersConfig::default()
    };

    assert_eq!(players.playback_timeout().as_millis(), 250);
    assert_eq!(players.metadata_sync_timeout().as_millis(), 40);
}
