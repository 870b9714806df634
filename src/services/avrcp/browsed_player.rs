use std::{future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use super::{
    error::{BrowseStatus, FrameworkError},
    folder_cache::FolderCache,
    framework::{MediaBrowser, MediaController, SessionEvent},
    types::{FolderItems, ListItem},
};

/// Connection state of a browse service client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection requested, waiting for the service
    Connecting,
    /// Connected, root folder known
    Connected,
}

/// Result of a folder query: answered from the cache or still in flight.
pub enum FolderFetch {
    /// The listing is available right away
    Ready(FolderItems),
    /// The listing arrives once the browse service answers
    Pending(BoxFuture<'static, FolderItems>),
}

/// Client of one application's browse service.
///
/// Only one request may be in flight at a time; a second request while one
/// is pending is rejected with [`BrowseStatus::ConnectionError`]. One-shot
/// requests disconnect from the service once they finish, whichever way they
/// finish, including when the task running them is cancelled.
///
/// Cloning is cheap and every clone shares the same connection and cache.
#[derive(Debug, Clone)]
pub struct BrowsedPlayer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    browser: Arc<dyn MediaBrowser>,
    package_name: String,
    display_name: String,
    cache: FolderCache,
    browse_timeout: Duration,
    playback_timeout: Duration,
    link: Mutex<Link>,
}

#[derive(Debug)]
struct Link {
    state: ConnectionState,
    in_flight: bool,
    root_id: Option<String>,
}

/// Marks the single in-flight request. Releasing it frees the slot and,
/// unless the connection is meant to persist, disconnects.
struct InFlight {
    inner: Arc<Inner>,
    keep_connected: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.link.lock().in_flight = false;
        if !self.keep_connected {
            self.inner.disconnect();
        }
    }
}

impl Inner {
    async fn ensure_connected(&self) -> Result<(), BrowseStatus> {
        {
            let mut link = self.link.lock();
            if link.state == ConnectionState::Connected && link.root_id.is_some() {
                return Ok(());
            }
            link.state = ConnectionState::Connecting;
        }

        let result = tokio::time::timeout(self.browse_timeout, self.browser.connect()).await;

        let mut link = self.link.lock();
        match result {
            Ok(Ok(root_id)) if !root_id.is_empty() => {
                debug!(package = %self.package_name, root_id, "Connected to browse service");
                link.state = ConnectionState::Connected;
                link.root_id = Some(root_id);
                Ok(())
            }
            Ok(Ok(_)) => {
                link.state = ConnectionState::Disconnected;
                drop(link);
                error!(package = %self.package_name, "Browse service returned an empty root");
                self.browser.disconnect();
                Err(BrowseStatus::ConnectionError)
            }
            Ok(Err(e @ FrameworkError::ConnectionSuspended(_))) => {
                link.state = ConnectionState::Disconnected;
                drop(link);
                warn!(package = %self.package_name, "{e}");
                self.browser.disconnect();
                Err(BrowseStatus::ConnectionError)
            }
            Ok(Err(e)) => {
                link.state = ConnectionState::Disconnected;
                warn!(package = %self.package_name, "{e}");
                Err(BrowseStatus::ConnectionError)
            }
            Err(_) => {
                link.state = ConnectionState::Disconnected;
                drop(link);
                warn!(
                    package = %self.package_name,
                    timeout_ms = self.browse_timeout.as_millis(),
                    "Browse service did not answer the connection request"
                );
                self.browser.disconnect();
                Err(BrowseStatus::ConnectionError)
            }
        }
    }

    fn disconnect(&self) {
        {
            let mut link = self.link.lock();
            if link.state == ConnectionState::Disconnected {
                return;
            }
            link.state = ConnectionState::Disconnected;
        }

        debug!(package = %self.package_name, "Disconnecting from browse service");
        self.browser.disconnect();
    }

    async fn list_folder(&self, parent_id: String) -> FolderItems {
        let result =
            tokio::time::timeout(self.browse_timeout, self.browser.subscribe(&parent_id)).await;
        self.browser.unsubscribe(&parent_id);

        match result {
            Ok(Ok(children)) => {
                let items: Vec<ListItem> = children.into_iter().map(ListItem::from).collect();
                debug!(
                    package = %self.package_name,
                    parent_id,
                    count = items.len(),
                    "Caching folder"
                );
                self.cache.insert(parent_id.clone(), items.clone());
                FolderItems::success(parent_id, items)
            }
            Ok(Err(e)) => {
                error!(package = %self.package_name, "Could not list folder: {e}");
                FolderItems::failed(BrowseStatus::LookupError, parent_id)
            }
            Err(_) => {
                warn!(package = %self.package_name, parent_id, "Folder listing timed out");
                FolderItems::failed(BrowseStatus::LookupError, parent_id)
            }
        }
    }
}

impl BrowsedPlayer {
    /// Wraps a browse service client.
    ///
    /// Every call into the service is bounded by `browse_timeout`; waiting
    /// for a played item to start is bounded by `playback_timeout`.
    pub fn new(
        browser: Arc<dyn MediaBrowser>,
        cache_size: usize,
        browse_timeout: Duration,
        playback_timeout: Duration,
    ) -> Self {
        let package_name = browser.package_name();
        let display_name = browser.display_name();

        Self {
            inner: Arc::new(Inner {
                browser,
                package_name,
                display_name,
                cache: FolderCache::new(cache_size),
                browse_timeout,
                playback_timeout,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    in_flight: false,
                    root_id: None,
                }),
            }),
        }
    }

    /// Package name of the application.
    pub fn package_name(&self) -> &str {
        &self.inner.package_name
    }

    /// Human readable name of the application.
    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    /// Root folder id learnt on the last successful connection.
    pub fn root_id(&self) -> Option<String> {
        self.inner.link.lock().root_id.clone()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.link.lock().in_flight
    }

    /// Folder listings cached for this service.
    pub fn cache(&self) -> &FolderCache {
        &self.inner.cache
    }

    /// Closes the connection if one is open.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    fn claim(&self) -> Result<InFlight, BrowseStatus> {
        let mut link = self.inner.link.lock();
        if link.in_flight {
            warn!(package = %self.inner.package_name, "Browse request already in flight");
            return Err(BrowseStatus::ConnectionError);
        }
        link.in_flight = true;

        Ok(InFlight {
            inner: Arc::clone(&self.inner),
            keep_connected: false,
        })
    }

    /// Connects and leaves the connection open on success.
    ///
    /// The caller owns the connection afterwards and closes it with
    /// [`disconnect`](Self::disconnect). A failed attempt cleans up after
    /// itself.
    ///
    /// # Errors
    /// Returns [`BrowseStatus::ConnectionError`] right away if another
    /// request is in flight.
    pub fn connect_persistent(
        &self,
    ) -> Result<impl Future<Output = BrowseStatus> + Send + 'static, BrowseStatus> {
        let mut guard = self.claim()?;
        let inner = Arc::clone(&self.inner);

        Ok(async move {
            let status = match inner.ensure_connected().await {
                Ok(()) => {
                    guard.keep_connected = true;
                    BrowseStatus::Success
                }
                Err(status) => status,
            };
            drop(guard);
            status
        })
    }

    /// Connects, runs `on_connected` and disconnects.
    ///
    /// `on_connected` sees the connection outcome and always runs exactly
    /// once.
    fn connect_once<F, Fut, T>(
        &self,
        on_connected: F,
    ) -> Result<impl Future<Output = T> + Send + 'static, BrowseStatus>
    where
        F: FnOnce(Result<Arc<dyn MediaBrowser>, BrowseStatus>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.claim()?;
        let inner = Arc::clone(&self.inner);

        Ok(async move {
            let connected = inner
                .ensure_connected()
                .await
                .map(|()| Arc::clone(&inner.browser));
            let output = on_connected(connected).await;
            drop(guard);
            output
        })
    }

    /// Lists the children of a native folder id.
    ///
    /// Cached folders are answered immediately without touching the
    /// service. Otherwise the listing is fetched, cached and returned.
    pub fn get_folder_items(&self, media_id: String) -> FolderFetch {
        if let Some(items) = self.inner.cache.get(&media_id) {
            debug!(package = %self.inner.package_name, media_id, "Serving cached folder");
            return FolderFetch::Ready(FolderItems::success(media_id, items));
        }

        let inner = Arc::clone(&self.inner);
        let parent_id = media_id.clone();
        let request = self.connect_once(move |connected| async move {
            match connected {
                Ok(_) => inner.list_folder(parent_id).await,
                Err(status) => FolderItems::failed(status, parent_id),
            }
        });

        match request {
            Ok(fetch) => FolderFetch::Pending(Box::pin(fetch)),
            Err(status) => FolderFetch::Ready(FolderItems::failed(status, media_id)),
        }
    }

    /// Starts playback of a native media id and waits until the session
    /// reports that it is playing.
    ///
    /// Resolves to [`BrowseStatus::PlaybackTimeoutError`] if playback does
    /// not start within the configured timeout.
    ///
    /// # Errors
    /// Returns [`BrowseStatus::ConnectionError`] right away if another
    /// request is in flight.
    pub fn play_item(
        &self,
        media_id: String,
    ) -> Result<impl Future<Output = BrowseStatus> + Send + 'static, BrowseStatus> {
        let timeout = self.inner.playback_timeout;
        let browse_timeout = self.inner.browse_timeout;
        let package = self.inner.package_name.clone();

        self.connect_once(move |connected| async move {
            let browser = match connected {
                Ok(browser) => browser,
                Err(status) => return status,
            };

            let Some(controller) = browser.session() else {
                error!(%package, media_id, "Browse service exposes no session");
                return BrowseStatus::ConnectionError;
            };

            let listener = PlaybackListener::new(controller.as_ref());

            info!(%package, media_id, "Playing browsed item");
            match tokio::time::timeout(browse_timeout, controller.play_from_media_id(&media_id)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(%package, media_id, "Play request rejected: {e}");
                    return BrowseStatus::ConnectionError;
                }
                Err(_) => {
                    warn!(%package, media_id, "Play request was not answered");
                    return BrowseStatus::ConnectionError;
                }
            }

            let status = listener.wait(controller.as_ref(), timeout).await;
            info!(%package, media_id, ?status, "Browsed item playback returned");
            status
        })
    }
}

/// Waits for a session to report that it is playing.
///
/// Consumed by [`wait`](Self::wait), so it reports at most one outcome.
/// Dropping it unsubscribes from the session.
struct PlaybackListener {
    events: broadcast::Receiver<SessionEvent>,
}

impl PlaybackListener {
    fn new(controller: &dyn MediaController) -> Self {
        Self {
            events: controller.subscribe(),
        }
    }

    async fn wait(mut self, controller: &dyn MediaController, timeout: Duration) -> BrowseStatus {
        if controller.playback_state().is_some_and(|state| state.is_playing()) {
            return BrowseStatus::Success;
        }

        match tokio::time::timeout(timeout, self.until_playing(controller)).await {
            Ok(()) => BrowseStatus::Success,
            Err(_) => {
                warn!(
                    package = %controller.package_name(),
                    "Timed out waiting for playback to start"
                );
                BrowseStatus::PlaybackTimeoutError
            }
        }
    }

    async fn until_playing(&mut self, controller: &dyn MediaController) {
        loop {
            match self.events.recv().await {
                Ok(SessionEvent::PlaybackStateChanged(Some(state))) if state.is_playing() => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if controller.playback_state().is_some_and(|state| state.is_playing()) {
                        return;
                    }
                }
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }
}
