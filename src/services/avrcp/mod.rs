//! AVRCP target player list.
//!
//! Presents every media application on the device to a remote AVRCP
//! controller as one aggregate player. Sessions are tracked in a
//! [`SourceRegistry`](registry::SourceRegistry), one of them is the active
//! player whose metadata, state and queue are pushed as [`TargetUpdate`]s,
//! and the browse services of all applications are merged into one browse
//! tree addressed by two digit source prefixes.

/// Browse service client with folder cache and playback wait
pub mod browsed_player;
mod command;
/// Change detection and delivery of updates
pub mod dispatcher;
/// Error and status types
pub mod error;
/// Diagnostic event logs
pub mod event_log;
/// Bounded folder cache
pub mod folder_cache;
/// Traits and events of the host media framework
pub mod framework;
/// External media id encoding
pub mod media_id;
/// Media session wrapper
pub mod media_player;
mod player_list;
/// Source id allocation and lookup
pub mod registry;
mod service;
/// Data types exchanged with the remote device
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{BrowseStatus, FrameworkError, TargetError};
pub use framework::{
    AudioContentType, AudioPlaybackConfig, AudioUsage, MediaBrowser, MediaController,
    MediaFramework, MediaKey, PackageAction, PackageEvent, SessionEvent,
};
pub use media_id::{MediaIdError, NOW_PLAYING_PREFIX};
pub use service::AvrcpTargetService;
pub use types::*;
