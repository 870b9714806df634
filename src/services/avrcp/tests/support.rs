//! Fake media framework and a harness that drives the player list directly.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    config::PlayersConfig,
    services::{
        avrcp::{
            browsed_player::BrowsedPlayer,
            command::Command,
            error::{FrameworkError, TargetError},
            framework::{MediaBrowser, MediaController, MediaFramework, MediaKey, SessionEvent},
            player_list::PlayerList,
            service::handle_command,
            types::{
                FolderItems, MediaItem, Metadata, PlayStatus, PlaybackState, QueueItem, SourceId,
                TargetUpdate,
            },
        },
        common::Property,
    },
};

pub fn track(title: &str) -> Metadata {
    Metadata {
        media_id: format!("media-{title}"),
        title: title.to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        track_number: 1,
        total_tracks: 10,
        genre: String::new(),
        duration_ms: 180_000,
    }
}

pub fn state(status: PlayStatus, position_ms: u64) -> PlaybackState {
    PlaybackState {
        status,
        position_ms,
        speed: 1.0,
        active_queue_item_id: None,
    }
}

pub fn queue_item(queue_id: u64, title: &str) -> QueueItem {
    QueueItem {
        queue_id,
        description: track(title),
    }
}

pub fn folder_item(media_id: &str, title: Option<&str>) -> MediaItem {
    MediaItem {
        media_id: media_id.to_string(),
        browsable: true,
        title: title.map(str::to_string),
        ..MediaItem::default()
    }
}

pub fn song_item(media_id: &str, title: &str) -> MediaItem {
    MediaItem {
        media_id: media_id.to_string(),
        browsable: false,
        title: Some(title.to_string()),
        artist: Some("Artist".to_string()),
        ..MediaItem::default()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    metadata: Option<Metadata>,
    playback: Option<PlaybackState>,
    queue: Option<Vec<QueueItem>>,
}

#[derive(Debug)]
pub struct FakeController {
    package: String,
    session: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    subscriptions: AtomicUsize,
    starts_on_play: AtomicBool,
    stalls_on_play: AtomicBool,
    pub played: Mutex<Vec<String>>,
    pub skipped: Mutex<Vec<u64>>,
    pub keys: Mutex<Vec<(MediaKey, bool)>>,
}

impl FakeController {
    pub fn new(package: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            package: package.to_string(),
            session: Mutex::new(SessionState::default()),
            events,
            subscriptions: AtomicUsize::new(0),
            starts_on_play: AtomicBool::new(false),
            stalls_on_play: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        })
    }

    /// A session that reports `title` in the given state and has no queue.
    pub fn with_track(package: &str, title: &str, status: PlayStatus) -> Arc<Self> {
        let controller = Self::new(package);
        {
            let mut session = controller.session.lock();
            session.metadata = Some(track(title));
            session.playback = Some(state(status, 0));
        }
        controller
    }

    pub fn set_metadata(&self, metadata: Option<Metadata>) {
        self.session.lock().metadata = metadata.clone();
        let _ = self.events.send(SessionEvent::MetadataChanged(metadata));
    }

    pub fn set_playback(&self, playback: Option<PlaybackState>) {
        self.session.lock().playback = playback.clone();
        let _ = self.events.send(SessionEvent::PlaybackStateChanged(playback));
    }

    pub fn set_queue(&self, queue: Option<Vec<QueueItem>>) {
        self.session.lock().queue = queue.clone();
        let _ = self.events.send(SessionEvent::QueueChanged(queue));
    }

    pub fn start_on_play(&self) {
        self.starts_on_play.store(true, Ordering::SeqCst);
    }

    /// Play requests are recorded but never answered.
    pub fn stall_on_play(&self) {
        self.stalls_on_play.store(true, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaController for FakeController {
    fn package_name(&self) -> String {
        self.package.clone()
    }

    fn metadata(&self) -> Option<Metadata> {
        self.session.lock().metadata.clone()
    }

    fn playback_state(&self) -> Option<PlaybackState> {
        self.session.lock().playback.clone()
    }

    fn queue(&self) -> Option<Vec<QueueItem>> {
        self.session.lock().queue.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.events.subscribe()
    }

    async fn play_from_media_id(&self, media_id: &str) -> Result<(), FrameworkError> {
        self.played.lock().push(media_id.to_string());
        if self.stalls_on_play.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.starts_on_play.load(Ordering::SeqCst) {
            self.set_playback(Some(state(PlayStatus::Playing, 0)));
        }
        Ok(())
    }

    async fn skip_to_queue_item(&self, queue_id: u64) -> Result<(), FrameworkError> {
        self.skipped.lock().push(queue_id);
        Ok(())
    }

    async fn send_media_key(&self, key: MediaKey, pushed: bool) -> Result<(), FrameworkError> {
        self.keys.lock().push((key, pushed));
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeBrowser {
    package: String,
    display: String,
    root: String,
    fails: bool,
    stalls: bool,
    folders: HashMap<String, Vec<MediaItem>>,
    stalled_folders: HashSet<String>,
    session: Option<Arc<FakeController>>,
    pub connects: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakeBrowser {
    pub fn new(package: &str, display: &str) -> Self {
        Self {
            package: package.to_string(),
            display: display.to_string(),
            root: "root".to_string(),
            fails: false,
            stalls: false,
            folders: HashMap::new(),
            stalled_folders: HashSet::new(),
            session: None,
            connects: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    /// Connection requests are never answered.
    pub fn stalling(mut self) -> Self {
        self.stalls = true;
        self
    }

    /// Listing `media_id` is never answered.
    pub fn with_stalled_folder(mut self, media_id: &str) -> Self {
        self.stalled_folders.insert(media_id.to_string());
        self
    }

    pub fn with_folder(mut self, media_id: &str, items: Vec<MediaItem>) -> Self {
        self.folders.insert(media_id.to_string(), items);
        self
    }

    pub fn with_session(mut self, controller: Arc<FakeController>) -> Self {
        self.session = Some(controller);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaBrowser for FakeBrowser {
    fn package_name(&self) -> String {
        self.package.clone()
    }

    fn display_name(&self) -> String {
        self.display.clone()
    }

    async fn connect(&self) -> Result<String, FrameworkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.stalls {
            std::future::pending::<()>().await;
        }
        if self.fails {
            return Err(FrameworkError::ConnectionFailed(self.package.clone()));
        }
        Ok(self.root.clone())
    }

    async fn subscribe(&self, parent_id: &str) -> Result<Vec<MediaItem>, FrameworkError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.stalled_folders.contains(parent_id) {
            std::future::pending::<()>().await;
        }
        self.folders
            .get(parent_id)
            .cloned()
            .ok_or_else(|| FrameworkError::SubscriptionFailed {
                parent_id: parent_id.to_string(),
                reason: "no such folder".to_string(),
            })
    }

    fn unsubscribe(&self, _parent_id: &str) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn session(&self) -> Option<Arc<dyn MediaController>> {
        self.session
            .clone()
            .map(|controller| controller as Arc<dyn MediaController>)
    }
}

#[derive(Default)]
pub struct FakeFramework {
    pub sessions: Vec<Arc<dyn MediaController>>,
    pub media_key_package: Option<String>,
    pub browsers: Vec<Arc<dyn MediaBrowser>>,
}

#[async_trait]
impl MediaFramework for FakeFramework {
    async fn active_sessions(&self) -> Vec<Arc<dyn MediaController>> {
        self.sessions.clone()
    }

    async fn media_key_event_session_package(&self) -> Option<String> {
        self.media_key_package.clone()
    }

    async fn browse_services(&self) -> Vec<Arc<dyn MediaBrowser>> {
        self.browsers.clone()
    }
}

/// A player list with its command queue and update channel in reach.
///
/// The list starts out initialized, so registering sources never triggers
/// the initial framework query.
pub struct Harness {
    pub list: PlayerList,
    commands: mpsc::UnboundedReceiver<Command>,
    updates: mpsc::UnboundedReceiver<TargetUpdate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlayersConfig::default())
    }

    pub fn with_config(config: PlayersConfig) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (updates_tx, updates) = mpsc::unbounded_channel();
        let list = PlayerList::new(
            config,
            Arc::new(FakeFramework::default()),
            commands_tx,
            updates_tx,
            Property::new(SourceId::NONE),
            Property::new(true),
        );

        Self {
            list,
            commands,
            updates,
        }
    }

    /// Lets background tasks run and feeds what they posted to the list.
    pub async fn pump(&mut self) {
        for _ in 0..5 {
            tokio::task::yield_now().await;
            while let Ok(command) = self.commands.try_recv() {
                handle_command(&mut self.list, command);
            }
        }
    }

    /// Every update dispatched so far.
    pub fn updates(&mut self) -> Vec<TargetUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    pub fn add(&mut self, controller: &Arc<FakeController>) -> SourceId {
        let controller: Arc<dyn MediaController> = controller.clone();
        self.list.add_media_player(Some(controller))
    }

    /// Verifies a browse service the way start-up does and registers it.
    pub async fn add_browsable(&mut self, browser: FakeBrowser) -> Arc<FakeBrowser> {
        let browser = Arc::new(browser);
        let player = BrowsedPlayer::new(
            browser.clone(),
            5,
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        );
        let status = player.connect_persistent().unwrap().await;
        self.list.on_browsable_player_connected(player, status);
        browser
    }

    pub async fn folder_items(&mut self, media_id: &str) -> FolderItems {
        let (tx, rx) = oneshot::channel();
        self.list.get_folder_items(media_id.to_string(), tx);
        self.pump().await;
        rx.await.unwrap()
    }

    pub async fn play_item(&mut self, media_id: &str, now_playing: bool) -> Result<(), TargetError> {
        let (tx, rx) = oneshot::channel();
        self.list.play_item(media_id, now_playing, tx);
        self.pump().await;
        rx.await.unwrap()
    }
}

pub fn sessions(controllers: &[&Arc<FakeController>]) -> Vec<Arc<dyn MediaController>> {
    controllers
        .iter()
        .map(|controller| Arc::clone(*controller) as Arc<dyn MediaController>)
        .collect()
}

pub fn source(raw: u8) -> SourceId {
    SourceId::new(raw).unwrap()
}
