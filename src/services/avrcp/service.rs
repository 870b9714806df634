use std::{pin::pin, sync::Arc};

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

use super::{
    command::{Command, CommandReceiver, CommandSender},
    error::TargetError,
    framework::{AudioPlaybackConfig, MediaController, MediaFramework, MediaKey, PackageEvent},
    player_list::PlayerList,
    types::{FolderItems, Metadata, PlaybackState, PlayerInfo, PlayerRoot, SourceId, TargetUpdate},
};
use crate::{config::PlayersConfig, services::common::Property};

/// AVRCP target service handle.
///
/// All state lives in a single task that processes commands one at a time.
/// The handle is cheap to clone; every clone talks to the same task.
/// Updates for the remote device are delivered on the channel passed to
/// [`start`](Self::start).
#[derive(Clone, Debug)]
pub struct AvrcpTargetService {
    commands: CommandSender,
    active_player: Property<SourceId>,
    initialized: Property<bool>,
}

impl AvrcpTargetService {
    /// Starts the service loop.
    ///
    /// Discovers the framework's browse services and begins verifying them.
    /// The initial player list is built in the background; use
    /// [`ready`](Self::ready) to wait for it.
    #[instrument(skip_all)]
    pub async fn start(
        config: PlayersConfig,
        framework: Arc<dyn MediaFramework>,
        updates: mpsc::UnboundedSender<TargetUpdate>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let active_player = Property::new(SourceId::NONE);
        let initialized = Property::new(false);

        let mut list = PlayerList::new(
            config,
            Arc::clone(&framework),
            commands.clone(),
            updates,
            active_player.clone(),
            initialized.clone(),
        );

        let browsers = framework.browse_services().await;
        info!(services = browsers.len(), "Starting AVRCP target service");
        list.init(browsers);

        tokio::spawn(run(list, receiver));

        Self {
            commands,
            active_player,
            initialized,
        }
    }

    fn send(&self, command: Command) -> Result<(), TargetError> {
        self.commands
            .send(command)
            .map_err(|_| TargetError::ServiceStopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TargetError> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| TargetError::ServiceStopped)
    }

    /// Waits until the initial player list has been built.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service stops first.
    pub async fn ready(&self) -> Result<(), TargetError> {
        let mut initialized = pin!(self.initialized.watch());
        while let Some(done) = initialized.next().await {
            if done {
                return Ok(());
            }
        }
        Err(TargetError::ServiceStopped)
    }

    /// Id of the active source, [`SourceId::NONE`] if there is none.
    pub fn active_player(&self) -> SourceId {
        self.active_player.get()
    }

    /// Watch for active source changes.
    pub fn active_player_monitored(&self) -> impl Stream<Item = SourceId> + Send + use<> {
        self.active_player.watch()
    }

    /// Reports a new list of active sessions, highest priority first.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn active_sessions_changed(
        &self,
        controllers: Vec<Arc<dyn MediaController>>,
    ) -> Result<(), TargetError> {
        self.send(Command::ActiveSessionsChanged(controllers))
    }

    /// Reports that another session now receives media key events.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn media_key_event_session_changed(
        &self,
        package_name: impl Into<String>,
        controller: Option<Arc<dyn MediaController>>,
    ) -> Result<(), TargetError> {
        self.send(Command::MediaKeyEventSessionChanged {
            package_name: package_name.into(),
            controller,
        })
    }

    /// Reports a package broadcast.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn package_changed(&self, event: PackageEvent) -> Result<(), TargetError> {
        self.send(Command::PackageChanged(event))
    }

    /// Reports the current audio playback configurations.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn playback_config_changed(
        &self,
        configs: Vec<AudioPlaybackConfig>,
    ) -> Result<(), TargetError> {
        self.send(Command::PlaybackConfigChanged(configs))
    }

    /// Makes a source the active player.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn set_active_player(&self, id: SourceId) -> Result<(), TargetError> {
        self.send(Command::SetActivePlayer(id))
    }

    /// Lists a folder of the aggregated browse tree; an empty id lists the root.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn get_folder_items(&self, media_id: &str) -> Result<FolderItems, TargetError> {
        self.request(|respond| Command::GetFolderItems {
            media_id: media_id.to_string(),
            respond,
        })
        .await
    }

    /// Plays a browse item, or skips to a queue item when `now_playing` is set.
    ///
    /// # Errors
    /// Returns an error if the id is malformed, the source is unknown or not
    /// browsable, there is no active player, or playback failed to start.
    pub async fn play_item(&self, media_id: &str, now_playing: bool) -> Result<(), TargetError> {
        self.request(|respond| Command::PlayItem {
            media_id: media_id.to_string(),
            now_playing,
            respond,
        })
        .await?
    }

    /// Forwards a transport key to the active session.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub fn send_media_key(&self, key: MediaKey, pushed: bool) -> Result<(), TargetError> {
        self.send(Command::SendMediaKey { key, pushed })
    }

    /// Now-playing id of the active source's current item, or empty.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn current_media_id(&self) -> Result<String, TargetError> {
        self.request(Command::CurrentMediaId).await
    }

    /// Metadata of the current track.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn current_song_info(&self) -> Result<Metadata, TargetError> {
        self.request(Command::CurrentSongInfo).await
    }

    /// Playback state of the active source.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn current_play_state(&self) -> Result<Option<PlaybackState>, TargetError> {
        self.request(Command::CurrentPlayState).await
    }

    /// Now-playing list of the active source.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn now_playing_list(&self) -> Result<Vec<Metadata>, TargetError> {
        self.request(Command::NowPlayingList).await
    }

    /// Players reported to the remote device.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn media_player_list(&self) -> Result<Vec<PlayerInfo>, TargetError> {
        self.request(Command::MediaPlayerList).await
    }

    /// Root of a player's browse tree.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn player_root(&self, player_id: SourceId) -> Result<PlayerRoot, TargetError> {
        self.request(|respond| Command::PlayerRoot { player_id, respond })
            .await
    }

    /// Id of the player the remote device addresses.
    pub fn current_player_id(&self) -> SourceId {
        SourceId::AGGREGATE
    }

    /// Diagnostic dump of the player list.
    ///
    /// # Errors
    /// Returns [`TargetError::ServiceStopped`] if the service loop is gone.
    pub async fn dump(&self) -> Result<String, TargetError> {
        self.request(Command::Dump).await
    }

    /// Stops the service loop, unregistering every callback.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

async fn run(mut list: PlayerList, mut commands: CommandReceiver) {
    while let Some(command) = commands.recv().await {
        if let Command::Shutdown = command {
            list.shutdown();
            break;
        }
        handle_command(&mut list, command);
    }

    debug!("AVRCP target service loop ended");
}

pub(super) fn handle_command(list: &mut PlayerList, command: Command) {
    match command {
        Command::ActiveSessionsChanged(controllers) => list.on_active_sessions_changed(controllers),
        Command::MediaKeyEventSessionChanged {
            package_name,
            controller,
        } => list.on_media_key_event_session_changed(&package_name, controller),
        Command::PackageChanged(event) => list.on_package_event(&event),
        Command::PlaybackConfigChanged(configs) => list.on_playback_config_changed(&configs),
        Command::SetActivePlayer(id) => list.set_active_player(id),

        Command::GetFolderItems { media_id, respond } => list.get_folder_items(media_id, respond),
        Command::PlayItem {
            media_id,
            now_playing,
            respond,
        } => list.play_item(&media_id, now_playing, respond),
        Command::SendMediaKey { key, pushed } => list.send_media_key(key, pushed),
        Command::CurrentMediaId(respond) => {
            let _ = respond.send(list.current_media_id());
        }
        Command::CurrentSongInfo(respond) => {
            let _ = respond.send(list.current_song_info());
        }
        Command::CurrentPlayState(respond) => {
            let _ = respond.send(list.current_play_state());
        }
        Command::NowPlayingList(respond) => {
            let _ = respond.send(list.now_playing_list());
        }
        Command::MediaPlayerList(respond) => {
            let _ = respond.send(list.media_player_list());
        }
        Command::PlayerRoot { player_id, respond } => {
            let _ = respond.send(list.player_root(player_id));
        }
        Command::Dump(respond) => {
            let _ = respond.send(list.dump());
        }

        Command::SessionEvent {
            source_id,
            generation,
            event,
        } => list.on_session_event(source_id, generation, event),
        Command::MetadataSyncTimeout {
            source_id,
            generation,
            epoch,
        } => list.on_metadata_sync_timeout(source_id, generation, epoch),
        Command::BrowsablePlayerConnected { player, status } => {
            list.on_browsable_player_connected(player, status);
        }
        Command::CurrentPlayersQueried {
            sessions,
            media_key_package,
        } => list.construct_current_players(sessions, media_key_package),

        Command::Shutdown => list.shutdown(),
    }
}
