use std::{collections::HashSet, fmt::Write, sync::Arc};

use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use super::{
    browsed_player::{BrowsedPlayer, FolderFetch},
    command::{Command, CommandSender},
    dispatcher::UpdateDispatcher,
    error::{BrowseStatus, TargetError},
    event_log::EventLog,
    framework::{
        AudioPlaybackConfig, MediaBrowser, MediaController, MediaFramework, MediaKey,
        PackageAction, PackageEvent, SessionEvent,
    },
    media_id,
    media_player::MediaPlayer,
    registry::SourceRegistry,
    types::{
        Folder, FolderItems, ListItem, MediaData, Metadata, PlayStatus, PlaybackState, PlayerInfo,
        PlayerRoot, SourceId, TargetUpdate,
    },
};
use crate::{config::PlayersConfig, services::common::Property};

/// The player list owned by the service loop.
///
/// Tracks every media session and browse service, arbitrates which session
/// is active, answers the remote device's browse queries through a single
/// aggregate player and pushes media and folder updates.
pub struct PlayerList {
    config: PlayersConfig,
    registry: SourceRegistry,
    active_id: SourceId,
    active_player: Property<SourceId>,
    initialized: Property<bool>,
    dispatcher: UpdateDispatcher,
    commands: CommandSender,
    framework: Arc<dyn MediaFramework>,
    audio_playback_active: bool,
    pending_browsable: usize,
    next_generation: u64,
    active_player_log: EventLog,
    audio_playback_log: EventLog,
}

impl PlayerList {
    pub(crate) fn new(
        config: PlayersConfig,
        framework: Arc<dyn MediaFramework>,
        commands: CommandSender,
        updates: tokio::sync::mpsc::UnboundedSender<TargetUpdate>,
        active_player: Property<SourceId>,
        initialized: Property<bool>,
    ) -> Self {
        let active_player_log = EventLog::new("Active player changes", config.active_player_log_size);
        let audio_playback_log =
            EventLog::new("External audio playback changes", config.audio_playback_log_size);

        Self {
            config,
            registry: SourceRegistry::new(),
            active_id: SourceId::NONE,
            active_player,
            initialized,
            dispatcher: UpdateDispatcher::new(updates),
            commands,
            framework,
            audio_playback_active: false,
            pending_browsable: 0,
            next_generation: 0,
            active_player_log,
            audio_playback_log,
        }
    }

    /// Id of the active source, [`SourceId::NONE`] if there is none.
    pub fn active_player_id(&self) -> SourceId {
        self.active_id
    }

    /// Whether external audio currently overrides the active source.
    pub fn audio_playback_active(&self) -> bool {
        self.audio_playback_active
    }

    /// The source registry.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn active_player(&self) -> Option<&MediaPlayer> {
        self.registry.media_player(self.active_id)
    }

    /// Verifies every browse service, then builds the initial player list.
    ///
    /// Each service is connected once; those that answer are registered as
    /// browsable. Once no verification is pending, the current sessions are
    /// queried from the framework.
    #[instrument(skip_all, fields(services = browsers.len()))]
    pub(crate) fn init(&mut self, browsers: Vec<Arc<dyn MediaBrowser>>) {
        for browser in browsers {
            let package = browser.package_name();
            if self.config.is_ignored(&package) {
                debug!(package, "Ignoring browse service");
                continue;
            }

            let player = BrowsedPlayer::new(
                browser,
                self.config.folder_cache_size,
                self.config.browse_timeout(),
                self.config.playback_timeout(),
            );

            let connect = match player.connect_persistent() {
                Ok(connect) => connect,
                Err(status) => {
                    warn!(package, ?status, "Could not verify browse service");
                    continue;
                }
            };

            self.pending_browsable += 1;
            let commands = self.commands.clone();
            tokio::spawn(async move {
                let status = connect.await;
                let package = player.package_name().to_owned();
                if commands
                    .send(Command::BrowsablePlayerConnected { player, status })
                    .is_err()
                {
                    debug!(package, "Service loop gone, dropping browse verification");
                }
            });
        }

        if self.pending_browsable == 0 {
            self.query_current_players();
        }
    }

    pub(crate) fn on_browsable_player_connected(&mut self, player: BrowsedPlayer, status: BrowseStatus) {
        self.pending_browsable = self.pending_browsable.saturating_sub(1);

        let duplicate = self.registry.has_browsable_for(player.package_name());
        if status == BrowseStatus::Success && duplicate {
            debug!(package = player.package_name(), "Package already browsable, dropping duplicate");
            player.disconnect();
        } else if status == BrowseStatus::Success {
            match self.registry.allocate(player.package_name()) {
                Ok(id) => {
                    info!(%id, package = player.package_name(), "Adding browsable player");
                    player.disconnect();
                    self.registry.insert_browsable(id, player);
                }
                Err(e) => {
                    error!("{e}");
                    player.disconnect();
                }
            }
        } else {
            info!(package = player.package_name(), ?status, "Failed to add browsable player");
        }

        if self.pending_browsable == 0 && !self.initialized.get() {
            self.query_current_players();
        }
    }

    fn query_current_players(&self) {
        let framework = Arc::clone(&self.framework);
        let commands = self.commands.clone();

        tokio::spawn(async move {
            let sessions = framework.active_sessions().await;
            let media_key_package = framework.media_key_event_session_package().await;
            let command = Command::CurrentPlayersQueried {
                sessions,
                media_key_package,
            };
            if commands.send(command).is_err() {
                debug!("Service loop gone, dropping current sessions");
            }
        });
    }

    /// Registers the initial sessions and picks the first active player.
    pub(crate) fn construct_current_players(
        &mut self,
        sessions: Vec<Arc<dyn MediaController>>,
        media_key_package: Option<String>,
    ) {
        self.on_active_sessions_changed(sessions);

        if !self.registry.has_media_player(self.active_id) {
            let from_media_key = media_key_package
                .as_deref()
                .and_then(|package| self.registry.media_player_id_for(package));
            let fallback = self.registry.media_players().map(|(id, _)| id).next();

            match from_media_key.or(fallback) {
                Some(id) => self.set_active_player(id),
                None => debug!("No media sessions to activate"),
            }
        }

        info!(
            players = self.registry.media_players().count(),
            browsable = self.registry.browsable_count(),
            "Player list initialized"
        );
        self.initialized.set(true);
        self.dispatcher.push_folder_update(true, true, false);
    }

    /// Registers a session or rebinds the one its package already has.
    ///
    /// Returns the source id, or [`SourceId::NONE`] if no controller was
    /// given, the package is ignored or no id is left.
    pub fn add_media_player(&mut self, controller: Option<Arc<dyn MediaController>>) -> SourceId {
        let Some(controller) = controller else {
            debug!("No controller to add");
            return SourceId::NONE;
        };

        let package = controller.package_name();
        if self.config.is_ignored(&package) {
            debug!(package, "Ignoring media session");
            return SourceId::NONE;
        }

        let id = match self.registry.allocate(&package) {
            Ok(id) => id,
            Err(e) => {
                error!("{e}");
                return SourceId::NONE;
            }
        };

        let Some(mut stale) = self
            .registry
            .insert_media_player(id, MediaPlayer::new(controller))
        else {
            info!(%id, package, "Adding media player");
            return id;
        };

        info!(%id, package, "Already have a controller for the player, updating instead");
        stale.unregister_callback();
        drop(stale);

        if id == self.active_id {
            let generation = self.bump_generation();
            let commands = self.commands.clone();
            if let Some(player) = self.registry.media_player_mut(id) {
                player.register_callback(id, generation, commands);
                let data = player.current_media_data();
                self.dispatcher.push_media_update(data);
            }
        }

        id
    }

    /// Drops a session.
    ///
    /// Removing the active session clears the active player and tells the
    /// remote device that nothing is playing.
    pub fn remove_media_player(&mut self, id: SourceId) {
        if !self.registry.has_media_player(id) {
            warn!(%id, "Trying to remove nonexistent media player");
            return;
        }

        if id == self.active_id {
            if let Some(player) = self.registry.media_player_mut(id) {
                player.unregister_callback();
            }
            self.active_id = SourceId::NONE;
            self.active_player.set(SourceId::NONE);
            self.active_player_log
                .record(format!("Active player {id} removed, no active player"));
            self.dispatcher.push_media_update(MediaData::placeholder());
        }

        if let Some(player) = self.registry.remove_media_player(id) {
            info!(%id, package = player.package_name(), "Removed media player");
        }
    }

    /// Makes `id` the active source.
    ///
    /// Unknown or already active ids are ignored. The new source's data is
    /// pushed right away only if its metadata is in sync; otherwise the
    /// registered callback delivers it once it is.
    #[instrument(skip(self))]
    pub fn set_active_player(&mut self, id: SourceId) {
        if !self.registry.has_media_player(id) {
            warn!("Player doesn't exist in list");
            return;
        }

        if id == self.active_id {
            warn!("Player is already the active player");
            return;
        }

        let previous = self.active_id;
        if let Some(player) = self.registry.media_player_mut(previous) {
            player.unregister_callback();
        }

        self.active_id = id;
        self.active_player.set(id);

        let generation = self.bump_generation();
        let commands = self.commands.clone();
        let sync_timeout = self.config.metadata_sync_timeout();
        let Some(player) = self.registry.media_player_mut(id) else {
            return;
        };
        player.register_callback(id, generation, commands);

        let package = player.package_name().to_string();
        info!(%previous, package, "Active player changed");
        self.active_player_log
            .record(format!("Active player set to {id} ({package})"));

        if !player.is_metadata_synced() {
            warn!(package, "New active player has no synced metadata, waiting for it");
            player.arm_sync_timer(sync_timeout);
            return;
        }

        let mut data = player.current_media_data();
        if self.audio_playback_active {
            data.state = self.dispatcher.current().state.clone();
        }
        self.dispatcher.push_media_update(data);
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Registers or updates each session, keeping only the first one per package.
    pub fn on_active_sessions_changed(&mut self, controllers: Vec<Arc<dyn MediaController>>) {
        let mut seen = HashSet::new();

        for controller in controllers {
            let package = controller.package_name();
            if !seen.insert(package.clone()) {
                debug!(package, "Skipping lower priority session of the same package");
                continue;
            }
            self.add_media_player(Some(controller));
        }
    }

    /// Follows the session that receives media key events.
    pub fn on_media_key_event_session_changed(
        &mut self,
        package_name: &str,
        controller: Option<Arc<dyn MediaController>>,
    ) {
        if let Some(controller) = controller {
            let package = controller.package_name();
            let id = match self.registry.media_player_id_for(&package) {
                Some(id) => id,
                None => {
                    warn!(package, "Media key session has no player yet, adding it");
                    self.add_media_player(Some(controller))
                }
            };

            if !id.is_none() {
                self.set_active_player(id);
            }
            return;
        }

        if package_name.is_empty() {
            debug!("Media key session cleared");
            return;
        }

        match self.registry.media_player_id_for(package_name) {
            Some(id) => self.set_active_player(id),
            None => error!(package_name, "Media key session changed to a package with no player"),
        }
    }

    /// Removes the sessions of uninstalled or wiped packages.
    pub fn on_package_event(&mut self, event: &PackageEvent) {
        let Some(package) = event.package_name() else {
            debug!(data = %event.data, "Ignoring package event without a package");
            return;
        };

        match event.action {
            PackageAction::Removed | PackageAction::DataCleared => {
                if event.replacing {
                    debug!(package, "Package is being replaced, keeping its player");
                    return;
                }

                match self.registry.media_player_id_for(package) {
                    Some(id) => {
                        info!(package, action = ?event.action, "Package gone, removing its player");
                        self.remove_media_player(id);
                    }
                    None => debug!(package, "Package gone, had no player"),
                }
            }
            PackageAction::Added | PackageAction::Changed => {
                debug!(package, action = ?event.action, "Package updated");
            }
        }
    }

    /// Tracks spoken navigation guidance playing outside of media sessions.
    pub fn on_playback_config_changed(&mut self, configs: &[AudioPlaybackConfig]) {
        let active = configs.iter().any(AudioPlaybackConfig::is_active_guidance);
        if active == self.audio_playback_active {
            return;
        }

        self.audio_playback_active = active;
        info!(active, "External audio playback changed");
        self.audio_playback_log
            .record(format!("External audio playback active: {active}"));
        self.update_media_for_audio_playback();
    }

    fn update_media_for_audio_playback(&mut self) {
        let mut data = match self.active_player() {
            Some(player) => player.current_media_data(),
            None => {
                debug!("No active player, using placeholder data");
                MediaData {
                    state: Some(PlaybackState {
                        status: PlayStatus::Stopped,
                        position_ms: 0,
                        speed: 0.0,
                        active_queue_item_id: None,
                    }),
                    ..MediaData::placeholder()
                }
            }
        };

        if data.state.as_ref().is_some_and(PlaybackState::is_playing) {
            info!("Active player is playing, leaving its state alone");
            return;
        }

        if self.audio_playback_active {
            let position = data.state.as_ref().map_or(0, |state| state.position_ms);
            data.state = Some(PlaybackState::playing_at(position));
        }

        self.dispatcher.push_media_update(data);
    }

    /// Handles an event forwarded from the active session.
    pub(crate) fn on_session_event(&mut self, source_id: SourceId, generation: u64, event: SessionEvent) {
        let sync_timeout = self.config.metadata_sync_timeout();
        let update = self
            .registry
            .media_player_mut(source_id)
            .and_then(|player| player.handle_event(generation, event, sync_timeout));

        if let Some(data) = update {
            self.media_updated(data);
        }
    }

    pub(crate) fn on_metadata_sync_timeout(&mut self, source_id: SourceId, generation: u64, epoch: u64) {
        let update = self
            .registry
            .media_player_mut(source_id)
            .and_then(|player| player.handle_sync_timeout(generation, epoch));

        if let Some(data) = update {
            self.media_updated(data);
        }
    }

    fn media_updated(&mut self, data: MediaData) {
        if data.metadata.is_none() {
            debug!("Media update without metadata, skipping");
            return;
        }

        let Some(state) = &data.state else {
            debug!("Media update without playback state, skipping");
            return;
        };

        if self.audio_playback_active && !state.is_playing() {
            debug!("External audio is playing, dropping non playing update");
            return;
        }

        self.dispatcher.push_media_update(data);
    }

    /// Lists a folder of the aggregated browse tree.
    ///
    /// The root lists one folder per browsable source. Anything below is
    /// delegated to the owning source and its ids are prefixed on the way
    /// back.
    pub(crate) fn get_folder_items(&self, media_id: String, respond: oneshot::Sender<FolderItems>) {
        if media_id.is_empty() {
            let _ = respond.send(FolderItems::success("", self.source_folders()));
            return;
        }

        let (source, native_id) = match media_id::parse_browse_media_id(&media_id) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Malformed browse id, this should never happen: {e}");
                let _ = respond.send(FolderItems::failed(BrowseStatus::LookupError, media_id));
                return;
            }
        };

        let Some(player) = self.registry.browsable(source) else {
            warn!(%source, "No browsable player for folder query");
            let _ = respond.send(FolderItems::failed(BrowseStatus::LookupError, media_id));
            return;
        };

        let native_id = if native_id.is_empty() {
            player.root_id().unwrap_or_default()
        } else {
            native_id
        };

        match player.get_folder_items(native_id) {
            FolderFetch::Ready(items) => {
                let _ = respond.send(prefix_folder_items(source, items));
            }
            FolderFetch::Pending(fetch) => {
                tokio::spawn(async move {
                    let items = fetch.await;
                    let _ = respond.send(prefix_folder_items(source, items));
                });
            }
        }
    }

    fn source_folders(&self) -> Vec<ListItem> {
        self.registry
            .browsable_players()
            .map(|(id, player)| {
                ListItem::Folder(Folder {
                    media_id: id.prefix(),
                    is_playable: false,
                    title: player.display_name().to_string(),
                })
            })
            .collect()
    }

    /// Plays an item addressed by an external media id.
    pub(crate) fn play_item(
        &self,
        media_id: &str,
        now_playing: bool,
        respond: oneshot::Sender<Result<(), TargetError>>,
    ) {
        if now_playing {
            self.play_now_playing_item(media_id, respond);
        } else {
            self.play_browsed_item(media_id, respond);
        }
    }

    fn play_now_playing_item(&self, media_id: &str, respond: oneshot::Sender<Result<(), TargetError>>) {
        let queue_id = match media_id::parse_now_playing_media_id(media_id) {
            Ok(queue_id) => queue_id,
            Err(e) => {
                error!("Malformed now playing id, this should never happen: {e}");
                let _ = respond.send(Err(e.into()));
                return;
            }
        };

        let Some(player) = self.active_player() else {
            warn!(queue_id, "No active player to skip in");
            let _ = respond.send(Err(TargetError::NoActivePlayer));
            return;
        };

        info!(queue_id, package = player.package_name(), "Skipping to queue item");
        let controller = Arc::clone(player.controller());
        tokio::spawn(async move {
            let result = controller
                .skip_to_queue_item(queue_id)
                .await
                .map_err(TargetError::from);
            let _ = respond.send(result);
        });
    }

    fn play_browsed_item(&self, media_id: &str, respond: oneshot::Sender<Result<(), TargetError>>) {
        let (source, native_id) = match media_id::parse_browse_media_id(media_id) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Malformed browse id, this should never happen: {e}");
                let _ = respond.send(Err(e.into()));
                return;
            }
        };

        let Some(player) = self.registry.browsable(source) else {
            error!(%source, "Player doesn't have a browse service");
            let _ = respond.send(Err(TargetError::NoBrowser(source)));
            return;
        };

        match player.play_item(native_id) {
            Ok(play) => {
                tokio::spawn(async move {
                    let status = play.await;
                    let _ = respond.send(status.into_result());
                });
            }
            Err(status) => {
                let _ = respond.send(status.into_result());
            }
        }
    }

    /// Now-playing id of the active source's current item, or empty.
    pub fn current_media_id(&self) -> String {
        self.active_player()
            .map(MediaPlayer::current_media_id)
            .unwrap_or_default()
    }

    /// Metadata of the active source's current track.
    pub fn current_song_info(&self) -> Metadata {
        self.active_player()
            .and_then(MediaPlayer::metadata)
            .unwrap_or_else(Metadata::empty)
    }

    /// Playback state of the active source, reported as playing while
    /// external audio is active.
    pub fn current_play_state(&self) -> Option<PlaybackState> {
        let player = self.active_player()?;
        let state = player.playback_state();

        if self.audio_playback_active && !state.as_ref().is_some_and(PlaybackState::is_playing) {
            let position = state.as_ref().map_or(0, |state| state.position_ms);
            return Some(PlaybackState::playing_at(position));
        }

        state
    }

    /// Queue of the active source.
    ///
    /// Without a usable queue, a single item holding the current track with
    /// an empty media id.
    pub fn now_playing_list(&self) -> Vec<Metadata> {
        if self.current_media_id().is_empty() {
            let song = Metadata {
                media_id: String::new(),
                ..self.current_song_info()
            };
            return vec![song];
        }

        self.active_player()
            .map(MediaPlayer::queue)
            .unwrap_or_default()
    }

    /// The player list reported to the remote device: only the aggregate player.
    pub fn media_player_list(&self) -> Vec<PlayerInfo> {
        vec![PlayerInfo {
            id: SourceId::AGGREGATE,
            name: self.config.aggregate_player_name.clone(),
            browsable: self.registry.browsable_count() > 0,
        }]
    }

    /// Root of a player's browse tree.
    pub fn player_root(&self, player_id: SourceId) -> PlayerRoot {
        PlayerRoot {
            is_aggregate: player_id == SourceId::AGGREGATE,
            root_id: String::new(),
            browsable_count: self.registry.browsable_count(),
        }
    }

    /// Id of the player the remote device addresses, always the aggregate player.
    pub fn current_player_id(&self) -> SourceId {
        SourceId::AGGREGATE
    }

    /// Forwards a transport key to the active session.
    pub fn send_media_key(&self, key: MediaKey, pushed: bool) {
        let Some(player) = self.active_player() else {
            warn!(?key, "No active player for media key");
            return;
        };

        debug!(?key, pushed, package = player.package_name(), "Forwarding media key");
        let controller = Arc::clone(player.controller());
        tokio::spawn(async move {
            if let Err(e) = controller.send_media_key(key, pushed).await {
                warn!(?key, "Media key rejected: {e}");
            }
        });
    }

    /// Human readable state for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "AVRCP target player list:");
        let _ = writeln!(out, "  Current player id: {}", self.current_player_id());
        match self.active_player() {
            Some(player) => {
                let _ = writeln!(
                    out,
                    "  Active player: {} ({})",
                    self.active_id,
                    player.package_name()
                );
            }
            None => {
                let _ = writeln!(out, "  Active player: none");
            }
        }
        let _ = writeln!(out, "  External audio active: {}", self.audio_playback_active);

        let _ = writeln!(out, "  Media players:");
        for (id, player) in self.registry.media_players() {
            let marker = if id == self.active_id { " [active]" } else { "" };
            let _ = writeln!(
                out,
                "    #{id} {}{marker} {:?}",
                player.package_name(),
                self.registry.capabilities(id)
            );
            let song = player.metadata().unwrap_or_else(Metadata::empty);
            let _ = writeln!(out, "      track: {} - {}", song.artist, song.title);
            match player.playback_state() {
                Some(state) => {
                    let _ = writeln!(
                        out,
                        "      state: {:?} at {} ms",
                        state.status, state.position_ms
                    );
                }
                None => {
                    let _ = writeln!(out, "      state: unknown");
                }
            }
            let _ = writeln!(out, "      queue: {} items", player.queue().len());
        }

        let _ = writeln!(out, "  Browsable players:");
        for (id, player) in self.registry.browsable_players() {
            let _ = writeln!(
                out,
                "    #{id} {} ({}) {:?} root={:?}",
                player.package_name(),
                player.display_name(),
                player.connection_state(),
                player.root_id().unwrap_or_default()
            );
            let _ = writeln!(
                out,
                "      cached folders ({}/{}): {:?}",
                player.cache().len(),
                player.cache().capacity(),
                player.cache().keys()
            );
        }

        self.active_player_log.dump(&mut out);
        self.audio_playback_log.dump(&mut out);
        out
    }

    /// Stops every callback and closes every browse connection.
    pub(crate) fn shutdown(&mut self) {
        self.registry.clear_media_players();
        for (_, player) in self.registry.browsable_players() {
            player.disconnect();
        }
        self.active_id = SourceId::NONE;
        self.active_player.set(SourceId::NONE);
        debug!("Player list shut down");
    }
}

fn prefix_folder_items(source: SourceId, mut folder: FolderItems) -> FolderItems {
    folder.parent_id = media_id::browse_media_id(source, &folder.parent_id);
    for item in &mut folder.items {
        let prefixed = media_id::browse_media_id(source, item.media_id());
        item.set_media_id(prefixed);
    }
    folder
}
