use std::fmt;

use bitflags::bitflags;

use super::{error::BrowseStatus, media_id};

/// Title reported for anything a player left unnamed.
pub const NOT_PROVIDED: &str = "Not Provided";

/// Positions closer than this are treated as the same playback state.
const POSITION_TOLERANCE_MS: u64 = 500;

/// Identifier of a media source as seen by the remote device.
///
/// Ids are small positive integers so that they fit the two digit prefix of
/// an external media id. `0` is reserved: it stands for "no active player"
/// and doubles as the id of the aggregate player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(u8);

impl SourceId {
    /// No source is active.
    pub const NONE: SourceId = SourceId(0);

    /// The single virtual player exposed to the remote device.
    pub const AGGREGATE: SourceId = SourceId(0);

    /// Largest id that still fits the two digit prefix.
    pub const MAX: u8 = 99;

    /// Create an id, rejecting values that do not fit two digits.
    pub fn new(raw: u8) -> Option<Self> {
        (raw <= Self::MAX).then_some(Self(raw))
    }

    /// Raw numeric value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the reserved "none" id.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Two digit, zero padded prefix used in external media ids.
    pub fn prefix(self) -> String {
        format!("{:02}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// What a registered source can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SourceCapabilities: u8 {
        /// The source has a live media session that can be controlled.
        const ACTIVE_SESSION = 1;
        /// The source exposes a browse service whose content can be listed.
        const BROWSABLE = 1 << 1;
    }
}

/// Track metadata in the shape the remote device consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Media id (native, browse or now-playing depending on where it came from)
    pub media_id: String,
    /// Track title
    pub title: String,
    /// Track artist(s)
    pub artist: String,
    /// Album name
    pub album: String,
    /// Position of the track in its album
    pub track_number: u32,
    /// Number of tracks in the album
    pub total_tracks: u32,
    /// Genre
    pub genre: String,
    /// Track length in milliseconds
    pub duration_ms: u64,
}

impl Metadata {
    /// Placeholder metadata sent when nothing is known about the track.
    pub fn empty() -> Self {
        Self {
            media_id: NOT_PROVIDED.to_string(),
            title: NOT_PROVIDED.to_string(),
            artist: String::new(),
            album: String::new(),
            track_number: 1,
            total_tracks: 1,
            genre: String::new(),
            duration_ms: 0,
        }
    }

    /// Whether two metadata records describe the same track, ignoring ids.
    pub fn same_track(&self, other: &Metadata) -> bool {
        self.title == other.title && self.artist == other.artist && self.album == other.album
    }
}

/// Transport status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayStatus {
    /// No state reported yet
    #[default]
    None,
    /// Stopped
    Stopped,
    /// Paused
    Paused,
    /// Playing
    Playing,
    /// Fast forwarding
    FastForwarding,
    /// Rewinding
    Rewinding,
    /// Buffering before playback
    Buffering,
    /// The session reported an error
    Error,
    /// Connecting to a remote output
    Connecting,
    /// Skipping to the previous track
    SkippingToPrevious,
    /// Skipping to the next track
    SkippingToNext,
    /// Skipping to a specific queue item
    SkippingToQueueItem,
}

/// Playback state of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackState {
    /// Transport status
    pub status: PlayStatus,
    /// Position in the current track, in milliseconds
    pub position_ms: u64,
    /// Playback speed, `1.0` for normal playback
    pub speed: f32,
    /// Queue id of the item being played, if the session exposes one
    pub active_queue_item_id: Option<u64>,
}

impl PlaybackState {
    /// A playing state at `position_ms` with normal speed.
    pub fn playing_at(position_ms: u64) -> Self {
        Self {
            status: PlayStatus::Playing,
            position_ms,
            speed: 1.0,
            active_queue_item_id: None,
        }
    }

    /// Whether the state reports active playback.
    pub fn is_playing(&self) -> bool {
        self.status == PlayStatus::Playing
    }
}

/// Compares two optional states the way the remote device cares about.
///
/// States are equal when status and active queue item match and the
/// positions are within half a second of each other.
pub fn playback_states_equal(a: Option<&PlaybackState>, b: Option<&PlaybackState>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.status == b.status
                && a.active_queue_item_id == b.active_queue_item_id
                && a.position_ms.abs_diff(b.position_ms) < POSITION_TOLERANCE_MS
        }
        _ => false,
    }
}

/// One entry of a session's play queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Queue id, unique within the session's queue
    pub queue_id: u64,
    /// Description of the queued track
    pub description: Metadata,
}

impl QueueItem {
    /// Converts the queue entry into metadata addressed by a now-playing id.
    pub fn to_metadata(&self) -> Metadata {
        Metadata {
            media_id: media_id::now_playing_media_id(self.queue_id),
            ..self.description.clone()
        }
    }
}

/// Snapshot of everything pushed to the remote device about the active source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaData {
    /// Current track metadata
    pub metadata: Option<Metadata>,
    /// Current playback state
    pub state: Option<PlaybackState>,
    /// Now-playing queue
    pub queue: Vec<Metadata>,
}

impl MediaData {
    /// "Nothing playing": empty metadata, no state and a one item placeholder queue.
    pub fn placeholder() -> Self {
        Self {
            metadata: Some(Metadata::empty()),
            state: None,
            queue: vec![Metadata::empty()],
        }
    }
}

/// Item returned by a browse service subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaItem {
    /// Native media id
    pub media_id: String,
    /// Whether the item is a folder that can be browsed into
    pub browsable: bool,
    /// Display title
    pub title: Option<String>,
    /// Artist, when the item is a track
    pub artist: Option<String>,
    /// Album, when the item is a track
    pub album: Option<String>,
    /// Length in milliseconds, when known
    pub duration_ms: Option<u64>,
}

/// A browsable folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Media id of the folder
    pub media_id: String,
    /// Whether the folder itself can be played
    pub is_playable: bool,
    /// Display title
    pub title: String,
}

/// One child of a folder: either a sub folder or a playable song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// A folder that can be browsed into
    Folder(Folder),
    /// A playable track
    Song(Metadata),
}

impl ListItem {
    /// Media id of the item.
    pub fn media_id(&self) -> &str {
        match self {
            ListItem::Folder(folder) => &folder.media_id,
            ListItem::Song(song) => &song.media_id,
        }
    }

    /// Whether the item is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, ListItem::Folder(_))
    }

    pub(crate) fn set_media_id(&mut self, media_id: String) {
        match self {
            ListItem::Folder(folder) => folder.media_id = media_id,
            ListItem::Song(song) => song.media_id = media_id,
        }
    }
}

impl From<MediaItem> for ListItem {
    fn from(item: MediaItem) -> Self {
        let title = item.title.unwrap_or_else(|| NOT_PROVIDED.to_string());

        if item.browsable {
            return ListItem::Folder(Folder {
                media_id: item.media_id,
                is_playable: false,
                title,
            });
        }

        ListItem::Song(Metadata {
            media_id: item.media_id,
            title,
            artist: item.artist.unwrap_or_default(),
            album: item.album.unwrap_or_default(),
            track_number: 1,
            total_tracks: 1,
            genre: String::new(),
            duration_ms: item.duration_ms.unwrap_or(0),
        })
    }
}

/// Response to a folder query: status, parent id and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderItems {
    /// Outcome of the query
    pub status: BrowseStatus,
    /// Id of the folder whose children are listed
    pub parent_id: String,
    /// Children of the folder, empty on failure
    pub items: Vec<ListItem>,
}

impl FolderItems {
    /// Successful listing.
    pub fn success(parent_id: impl Into<String>, items: Vec<ListItem>) -> Self {
        Self {
            status: BrowseStatus::Success,
            parent_id: parent_id.into(),
            items,
        }
    }

    /// Failed listing: no children.
    pub fn failed(status: BrowseStatus, parent_id: impl Into<String>) -> Self {
        Self {
            status,
            parent_id: parent_id.into(),
            items: Vec::new(),
        }
    }
}

/// Player entry reported in the remote device's player list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Player id
    pub id: SourceId,
    /// Display name
    pub name: String,
    /// Whether the player's content can be browsed
    pub browsable: bool,
}

/// Answer to a "get player root" query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRoot {
    /// Whether the queried player is the aggregate player
    pub is_aggregate: bool,
    /// Root folder id of the player, always empty for the aggregate player
    pub root_id: String,
    /// Number of browsable sources below the root
    pub browsable_count: usize,
}

/// Notification pushed to the protocol layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetUpdate {
    /// Media data of the active source changed.
    Media {
        /// Track metadata differs from the last update
        metadata_changed: bool,
        /// Playback state differs from the last update
        state_changed: bool,
        /// Now-playing queue differs from the last update
        queue_changed: bool,
        /// The data that was dispatched
        data: MediaData,
    },

    /// Player list or browse tree changed.
    Folder {
        /// The list of available players changed
        available_players_changed: bool,
        /// The addressed player changed
        addressed_player_changed: bool,
        /// Item ids may have become stale
        uids_changed: bool,
    },
}
