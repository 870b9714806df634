use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use tokio::time::Instant;

use super::support::{FakeBrowser, FakeController, folder_item, song_item, state};
use crate::services::avrcp::{
    browsed_player::{BrowsedPlayer, ConnectionState, FolderFetch},
    error::BrowseStatus,
    types::{FolderItems, ListItem, PlayStatus},
};

const TIMEOUT: Duration = Duration::from_secs(5);
const BROWSE_TIMEOUT: Duration = Duration::from_secs(2);

fn player(browser: &Arc<FakeBrowser>) -> BrowsedPlayer {
    BrowsedPlayer::new(browser.clone(), 5, BROWSE_TIMEOUT, TIMEOUT)
}

fn library() -> FakeBrowser {
    FakeBrowser::new("com.example.music", "Music").with_folder(
        "root",
        vec![
            folder_item("albums", Some("Albums")),
            folder_item("untitled", None),
            song_item("song-1", "First"),
        ],
    )
}

async fn fetch(player: &BrowsedPlayer, media_id: &str) -> FolderItems {
    match player.get_folder_items(media_id.to_string()) {
        FolderFetch::Ready(items) => items,
        FolderFetch::Pending(fetch) => fetch.await,
    }
}

#[tokio::test]
async fn fetch_converts_caches_and_disconnects() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let items = fetch(&player, "root").await;

    assert_eq!(items.status, BrowseStatus::Success);
    assert_eq!(items.parent_id, "root");
    assert_eq!(items.items.len(), 3);
    assert!(items.items[0].is_folder());
    assert!(matches!(&items.items[1], ListItem::Folder(f) if f.title == "Not Provided"));
    assert!(matches!(&items.items[2], ListItem::Song(s) if s.title == "First"));

    assert!(player.cache().contains("root"));
    assert_eq!(browser.connects(), 1);
    assert_eq!(browser.disconnects(), 1);
    assert_eq!(browser.subscribes.load(Ordering::SeqCst), 1);
    assert_eq!(browser.unsubscribes.load(Ordering::SeqCst), 1);
    assert_eq!(player.connection_state(), ConnectionState::Disconnected);
    assert!(!player.is_busy());
}

#[tokio::test]
async fn cached_folder_is_served_without_connecting() {
    let browser = Arc::new(library());
    let player = player(&browser);
    fetch(&player, "root").await;

    let FolderFetch::Ready(items) = player.get_folder_items("root".to_string()) else {
        panic!("cached folder should be ready");
    };

    assert_eq!(items.status, BrowseStatus::Success);
    assert_eq!(items.items.len(), 3);
    assert_eq!(browser.connects(), 1);
}

#[tokio::test]
async fn cached_listings_are_copies() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let mut first = fetch(&player, "root").await;
    first.items[0].set_media_id("01albums".to_string());

    let second = fetch(&player, "root").await;
    assert_eq!(second.items[0].media_id(), "albums");
}

#[tokio::test]
async fn failed_lookup_is_not_cached() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let items = fetch(&player, "missing").await;

    assert_eq!(items, FolderItems::failed(BrowseStatus::LookupError, "missing"));
    assert!(!player.cache().contains("missing"));
    assert_eq!(browser.disconnects(), 1);
}

#[tokio::test]
async fn second_request_is_rejected_while_one_is_in_flight() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let FolderFetch::Pending(first) = player.get_folder_items("root".to_string()) else {
        panic!("uncached folder should be pending");
    };
    assert!(player.is_busy());

    let FolderFetch::Ready(rejected) = player.get_folder_items("albums".to_string()) else {
        panic!("busy player should reject right away");
    };
    assert_eq!(rejected.status, BrowseStatus::ConnectionError);
    assert!(player.play_item("song-1".to_string()).is_err());

    assert_eq!(first.await.status, BrowseStatus::Success);
    assert!(!player.is_busy());
}

#[tokio::test]
async fn dropping_a_pending_request_frees_the_slot() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let pending = player.get_folder_items("root".to_string());
    assert!(player.is_busy());
    drop(pending);

    assert!(!player.is_busy());
    assert_eq!(fetch(&player, "root").await.status, BrowseStatus::Success);
}

#[tokio::test]
async fn connection_failure_is_reported() {
    let browser = Arc::new(library().failing());
    let player = player(&browser);

    let items = fetch(&player, "root").await;

    assert_eq!(items, FolderItems::failed(BrowseStatus::ConnectionError, "root"));
    assert_eq!(player.connection_state(), ConnectionState::Disconnected);
    assert!(!player.is_busy());
}

#[tokio::test(start_paused = true)]
async fn unanswered_connect_times_out() {
    let browser = Arc::new(library().stalling());
    let player = player(&browser);

    let started = Instant::now();
    let status = player.connect_persistent().unwrap().await;

    assert_eq!(status, BrowseStatus::ConnectionError);
    assert!(started.elapsed() >= BROWSE_TIMEOUT);
    assert_eq!(player.connection_state(), ConnectionState::Disconnected);
    assert_eq!(player.root_id(), None);
    assert_eq!(browser.disconnects(), 1);
    assert!(!player.is_busy());
}

#[tokio::test(start_paused = true)]
async fn unanswered_listing_is_a_lookup_error() {
    let browser = Arc::new(library().with_stalled_folder("albums"));
    let player = player(&browser);

    let items = fetch(&player, "albums").await;

    assert_eq!(items, FolderItems::failed(BrowseStatus::LookupError, "albums"));
    assert!(!player.cache().contains("albums"));
    assert_eq!(browser.unsubscribes(), 1);
    assert_eq!(browser.disconnects(), 1);
    assert!(!player.is_busy());

    assert_eq!(fetch(&player, "root").await.status, BrowseStatus::Success);
}

#[tokio::test]
async fn empty_root_is_a_connection_error() {
    let browser = Arc::new(library().with_root(""));
    let player = player(&browser);

    let status = player.connect_persistent().unwrap().await;

    assert_eq!(status, BrowseStatus::ConnectionError);
    assert_eq!(player.root_id(), None);
    assert_eq!(browser.disconnects(), 1);
}

#[tokio::test]
async fn persistent_connection_stays_open_until_disconnected() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let status = player.connect_persistent().unwrap().await;

    assert_eq!(status, BrowseStatus::Success);
    assert_eq!(player.root_id().as_deref(), Some("root"));
    assert_eq!(player.connection_state(), ConnectionState::Connected);
    assert_eq!(browser.disconnects(), 0);

    player.disconnect();
    player.disconnect();
    assert_eq!(browser.disconnects(), 1);
}

#[tokio::test]
async fn play_succeeds_when_already_playing() {
    let session = FakeController::with_track("com.example.music", "First", PlayStatus::Playing);
    let browser = Arc::new(library().with_session(session.clone()));
    let player = player(&browser);

    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::Success);
    assert_eq!(*session.played.lock(), vec!["song-1".to_string()]);
    assert_eq!(browser.disconnects(), 1);
}

#[tokio::test]
async fn play_succeeds_when_the_session_starts_playing() {
    let session = FakeController::with_track("com.example.music", "First", PlayStatus::Paused);
    session.start_on_play();
    let browser = Arc::new(library().with_session(session.clone()));
    let player = player(&browser);

    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn play_waits_for_late_playback() {
    let session = FakeController::with_track("com.example.music", "First", PlayStatus::Paused);
    let browser = Arc::new(library().with_session(session.clone()));
    let player = player(&browser);

    let late = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        late.set_playback(Some(state(PlayStatus::Paused, 0)));
        late.set_playback(Some(state(PlayStatus::Playing, 0)));
    });

    let started = Instant::now();
    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::Success);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn play_times_out_when_playback_never_starts() {
    let session = FakeController::with_track("com.example.music", "First", PlayStatus::Paused);
    let browser = Arc::new(library().with_session(session.clone()));
    let player = player(&browser);

    let started = Instant::now();
    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::PlaybackTimeoutError);
    assert!(started.elapsed() >= TIMEOUT);
    assert!(!player.is_busy());
    assert_eq!(browser.disconnects(), 1);
}

#[tokio::test]
async fn play_without_a_session_is_a_connection_error() {
    let browser = Arc::new(library());
    let player = player(&browser);

    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::ConnectionError);
    assert!(!player.is_busy());
}

#[tokio::test(start_paused = true)]
async fn unanswered_play_request_is_a_connection_error() {
    let session = FakeController::with_track("com.example.music", "First", PlayStatus::Paused);
    session.stall_on_play();
    let browser = Arc::new(library().with_session(session.clone()));
    let player = player(&browser);

    let started = Instant::now();
    let status = player.play_item("song-1".to_string()).unwrap().await;

    assert_eq!(status, BrowseStatus::ConnectionError);
    assert!(started.elapsed() >= BROWSE_TIMEOUT);
    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(*session.played.lock(), vec!["song-1".to_string()]);
    assert_eq!(browser.disconnects(), 1);
    assert!(!player.is_busy());
}
