use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{
    browsed_player::BrowsedPlayer,
    error::{BrowseStatus, TargetError},
    framework::{AudioPlaybackConfig, MediaController, MediaKey, PackageEvent, SessionEvent},
    types::{FolderItems, Metadata, PlaybackState, PlayerInfo, PlayerRoot, SourceId},
};

pub(crate) type CommandSender = mpsc::UnboundedSender<Command>;
pub(crate) type CommandReceiver = mpsc::UnboundedReceiver<Command>;

/// Everything the service loop reacts to.
///
/// Host notifications and remote queries come in through the service
/// handle; completions of background work (session events, browse
/// connections, timers) are posted back by the tasks that produced them.
pub(crate) enum Command {
    ActiveSessionsChanged(Vec<Arc<dyn MediaController>>),
    MediaKeyEventSessionChanged {
        package_name: String,
        controller: Option<Arc<dyn MediaController>>,
    },
    PackageChanged(PackageEvent),
    PlaybackConfigChanged(Vec<AudioPlaybackConfig>),
    SetActivePlayer(SourceId),

    GetFolderItems {
        media_id: String,
        respond: oneshot::Sender<FolderItems>,
    },
    PlayItem {
        media_id: String,
        now_playing: bool,
        respond: oneshot::Sender<Result<(), TargetError>>,
    },
    SendMediaKey {
        key: MediaKey,
        pushed: bool,
    },
    CurrentMediaId(oneshot::Sender<String>),
    CurrentSongInfo(oneshot::Sender<Metadata>),
    CurrentPlayState(oneshot::Sender<Option<PlaybackState>>),
    NowPlayingList(oneshot::Sender<Vec<Metadata>>),
    MediaPlayerList(oneshot::Sender<Vec<PlayerInfo>>),
    PlayerRoot {
        player_id: SourceId,
        respond: oneshot::Sender<PlayerRoot>,
    },
    Dump(oneshot::Sender<String>),

    SessionEvent {
        source_id: SourceId,
        generation: u64,
        event: SessionEvent,
    },
    MetadataSyncTimeout {
        source_id: SourceId,
        generation: u64,
        epoch: u64,
    },
    BrowsablePlayerConnected {
        player: BrowsedPlayer,
        status: BrowseStatus,
    },
    CurrentPlayersQueried {
        sessions: Vec<Arc<dyn MediaController>>,
        media_key_package: Option<String>,
    },

    Shutdown,
}
