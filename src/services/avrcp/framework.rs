//! Seams to the host media framework.
//!
//! Sessions, browse services and the audio/package notifications are owned
//! by the host platform. The player list only talks to them through these
//! traits and event types.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    error::FrameworkError,
    types::{MediaItem, Metadata, PlaybackState, QueueItem},
};

/// Change notifications emitted by a media session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Track metadata changed
    MetadataChanged(Option<Metadata>),

    /// Playback state changed
    PlaybackStateChanged(Option<PlaybackState>),

    /// Play queue changed
    QueueChanged(Option<Vec<QueueItem>>),

    /// The session went away
    SessionDestroyed,
}

/// Transport keys forwarded from the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    /// Play
    Play,
    /// Pause
    Pause,
    /// Toggle between play and pause
    PlayPause,
    /// Stop
    Stop,
    /// Next track
    Next,
    /// Previous track
    Previous,
    /// Fast forward
    FastForward,
    /// Rewind
    Rewind,
}

/// Handle to a live media session of one application.
#[async_trait]
pub trait MediaController: Send + Sync + fmt::Debug {
    /// Package name of the application owning the session.
    fn package_name(&self) -> String;

    /// Current track metadata.
    fn metadata(&self) -> Option<Metadata>;

    /// Current playback state.
    fn playback_state(&self) -> Option<PlaybackState>;

    /// Current play queue.
    fn queue(&self) -> Option<Vec<QueueItem>>;

    /// Subscribes to change notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Starts playback of a native media id.
    async fn play_from_media_id(&self, media_id: &str) -> Result<(), FrameworkError>;

    /// Jumps to an entry of the play queue.
    async fn skip_to_queue_item(&self, queue_id: u64) -> Result<(), FrameworkError>;

    /// Delivers a transport key press or release.
    async fn send_media_key(&self, key: MediaKey, pushed: bool) -> Result<(), FrameworkError>;
}

/// Client of an application's browse service.
#[async_trait]
pub trait MediaBrowser: Send + Sync + fmt::Debug {
    /// Package name of the application exposing the service.
    fn package_name(&self) -> String;

    /// Human readable name of the application.
    fn display_name(&self) -> String;

    /// Connects to the service and returns its root folder id.
    async fn connect(&self) -> Result<String, FrameworkError>;

    /// Subscribes to a folder and returns its children.
    async fn subscribe(&self, parent_id: &str) -> Result<Vec<MediaItem>, FrameworkError>;

    /// Drops a folder subscription.
    fn unsubscribe(&self, parent_id: &str);

    /// Closes the connection.
    fn disconnect(&self);

    /// Session controller of the connected service, if it exposes one.
    fn session(&self) -> Option<Arc<dyn MediaController>>;
}

/// Queries answered by the host media framework.
#[async_trait]
pub trait MediaFramework: Send + Sync {
    /// Sessions that are currently active, most recent first.
    async fn active_sessions(&self) -> Vec<Arc<dyn MediaController>>;

    /// Package of the session that last received media key events.
    async fn media_key_event_session_package(&self) -> Option<String>;

    /// Every installed browse service.
    async fn browse_services(&self) -> Vec<Arc<dyn MediaBrowser>>;
}

/// Kind of package change broadcast by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    /// A package was installed
    Added,
    /// A package was updated or its components changed
    Changed,
    /// A package was uninstalled
    Removed,
    /// A package's data was cleared
    DataCleared,
}

/// Package change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEvent {
    /// What happened to the package
    pub action: PackageAction,
    /// Data uri of the broadcast, `package:<name>` for well formed events
    pub data: String,
    /// The package is being replaced by a new version
    pub replacing: bool,
}

impl PackageEvent {
    /// Package named by the event, if the data uri carries one.
    pub fn package_name(&self) -> Option<&str> {
        self.data
            .strip_prefix("package:")
            .filter(|name| !name.is_empty())
    }
}

/// Audio usage attribute of a playback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioUsage {
    /// Music and other media
    Media,
    /// Voice or video calls
    VoiceCommunication,
    /// Turn by turn navigation prompts
    NavigationGuidance,
    /// Notifications and ringtones
    Notification,
    /// Game audio
    Game,
    /// Anything else
    Unknown,
}

/// Audio content type attribute of a playback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContentType {
    /// Music
    Music,
    /// Speech
    Speech,
    /// Movie soundtrack
    Movie,
    /// Sound effects and tones
    Sonification,
    /// Anything else
    Unknown,
}

/// State of one audio playback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPlaybackConfig {
    /// Whether the stream is currently playing
    pub active: bool,
    /// Usage attribute
    pub usage: AudioUsage,
    /// Content type attribute
    pub content_type: AudioContentType,
}

impl AudioPlaybackConfig {
    /// Whether the stream is spoken navigation guidance that is playing.
    pub fn is_active_guidance(&self) -> bool {
        self.active
            && self.usage == AudioUsage::NavigationGuidance
            && self.content_type == AudioContentType::Speech
    }
}
