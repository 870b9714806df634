use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    command::{Command, CommandSender},
    framework::{MediaController, SessionEvent},
    media_id,
    types::{MediaData, Metadata, PlaybackState, SourceId},
};

/// A registered media session.
///
/// Reads always go straight to the session. While registered as the active
/// player, session events are forwarded to the service loop tagged with a
/// generation so that events queued before an unregistration are ignored.
pub struct MediaPlayer {
    controller: Arc<dyn MediaController>,
    package_name: String,
    registration: Option<Registration>,
    sync_timer: Option<JoinHandle<()>>,
    sync_epoch: u64,
}

struct Registration {
    source_id: SourceId,
    generation: u64,
    commands: CommandSender,
    forwarder: JoinHandle<()>,
}

impl MediaPlayer {
    /// Wraps a session controller.
    pub fn new(controller: Arc<dyn MediaController>) -> Self {
        let package_name = controller.package_name();

        Self {
            controller,
            package_name,
            registration: None,
            sync_timer: None,
            sync_epoch: 0,
        }
    }

    /// Package name of the application owning the session.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The wrapped session controller.
    pub fn controller(&self) -> &Arc<dyn MediaController> {
        &self.controller
    }

    /// Current track metadata.
    pub fn metadata(&self) -> Option<Metadata> {
        self.controller.metadata()
    }

    /// Current playback state.
    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.controller.playback_state()
    }

    /// Current queue, with now-playing ids.
    pub fn queue(&self) -> Vec<Metadata> {
        self.controller
            .queue()
            .unwrap_or_default()
            .iter()
            .map(|item| item.to_metadata())
            .collect()
    }

    /// Now-playing id of the item being played.
    ///
    /// Empty when the session has no queue or does not report which queue
    /// item is active.
    pub fn current_media_id(&self) -> String {
        let active = self
            .controller
            .playback_state()
            .and_then(|state| state.active_queue_item_id);
        let has_queue = self
            .controller
            .queue()
            .is_some_and(|queue| !queue.is_empty());

        match active {
            Some(queue_id) if has_queue => media_id::now_playing_media_id(queue_id),
            _ => String::new(),
        }
    }

    /// Snapshot of metadata, state and queue.
    pub fn current_media_data(&self) -> MediaData {
        MediaData {
            metadata: self.metadata(),
            state: self.playback_state(),
            queue: self.queue(),
        }
    }

    /// Whether metadata and queue agree on the current track.
    ///
    /// A session that has not reported metadata yet is never synced. When
    /// it exposes a queue and an active queue item, the active item must
    /// describe the same track as the metadata.
    pub fn is_metadata_synced(&self) -> bool {
        let Some(metadata) = self.controller.metadata() else {
            return false;
        };

        let active = self
            .controller
            .playback_state()
            .and_then(|state| state.active_queue_item_id);

        match (self.controller.queue(), active) {
            (Some(queue), Some(queue_id)) if !queue.is_empty() => queue
                .iter()
                .find(|item| item.queue_id == queue_id)
                .is_some_and(|item| item.description.same_track(&metadata)),
            _ => true,
        }
    }

    /// Whether session events are being forwarded.
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Starts forwarding session events to the service loop.
    ///
    /// `generation` must be unique across every registration made by the
    /// caller; events and timeouts carrying another generation are ignored.
    pub(crate) fn register_callback(
        &mut self,
        source_id: SourceId,
        generation: u64,
        commands: CommandSender,
    ) {
        self.unregister_callback();

        let mut events = self.controller.subscribe();
        let controller = Arc::clone(&self.controller);
        let forward = commands.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session events lagged, resyncing");
                        SessionEvent::PlaybackStateChanged(controller.playback_state())
                    }
                    Err(RecvError::Closed) => break,
                };

                let destroyed = matches!(event, SessionEvent::SessionDestroyed);
                let command = Command::SessionEvent {
                    source_id,
                    generation,
                    event,
                };
                if forward.send(command).is_err() || destroyed {
                    break;
                }
            }
        });

        debug!(package = %self.package_name, %source_id, generation, "Registered session callback");
        self.registration = Some(Registration {
            source_id,
            generation,
            commands,
            forwarder,
        });
    }

    /// Stops forwarding session events and cancels any pending sync timeout.
    pub(crate) fn unregister_callback(&mut self) {
        self.cancel_sync_timer();

        if let Some(registration) = self.registration.take() {
            registration.forwarder.abort();
            debug!(
                package = %self.package_name,
                generation = registration.generation,
                "Unregistered session callback"
            );
        }
    }

    /// Reacts to a forwarded session event.
    ///
    /// Returns the data to dispatch, or `None` if the event is stale, carries
    /// nothing usable, or metadata and queue are still out of sync.
    pub(crate) fn handle_event(
        &mut self,
        generation: u64,
        event: SessionEvent,
        sync_timeout: Duration,
    ) -> Option<MediaData> {
        let current = self.registration.as_ref()?.generation;
        if current != generation {
            debug!(package = %self.package_name, generation, current, "Dropping stale session event");
            return None;
        }

        match event {
            SessionEvent::MetadataChanged(None) => {
                debug!(package = %self.package_name, "Metadata cleared, nothing to send");
                None
            }
            SessionEvent::PlaybackStateChanged(None) => {
                debug!(package = %self.package_name, "Playback state cleared, nothing to send");
                None
            }
            SessionEvent::SessionDestroyed => {
                info!(package = %self.package_name, "Session destroyed");
                self.unregister_callback();
                None
            }
            SessionEvent::MetadataChanged(Some(_))
            | SessionEvent::PlaybackStateChanged(Some(_))
            | SessionEvent::QueueChanged(_) => self.try_send_update(sync_timeout),
        }
    }

    fn try_send_update(&mut self, sync_timeout: Duration) -> Option<MediaData> {
        self.cancel_sync_timer();

        if self.is_metadata_synced() {
            return Some(self.current_media_data());
        }

        debug!(package = %self.package_name, "Metadata and queue disagree, waiting for sync");
        self.arm_sync_timer(sync_timeout);
        None
    }

    /// Schedules a forced update after `sync_timeout`, replacing any pending one.
    ///
    /// Does nothing while unregistered.
    pub(crate) fn arm_sync_timer(&mut self, sync_timeout: Duration) {
        self.cancel_sync_timer();

        let Some(registration) = self.registration.as_ref() else {
            return;
        };

        let source_id = registration.source_id;
        let generation = registration.generation;
        let commands = registration.commands.clone();
        self.sync_epoch += 1;
        let epoch = self.sync_epoch;
        self.sync_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(sync_timeout).await;
            let command = Command::MetadataSyncTimeout {
                source_id,
                generation,
                epoch,
            };
            if commands.send(command).is_err() {
                debug!(%source_id, "Service loop gone, dropping metadata sync timeout");
            }
        }));
    }

    /// Whether a forced update is scheduled.
    pub fn is_waiting_for_sync(&self) -> bool {
        self.sync_timer.is_some()
    }

    /// Sends whatever is current once metadata failed to sync in time.
    pub(crate) fn handle_sync_timeout(&mut self, generation: u64, epoch: u64) -> Option<MediaData> {
        let registered = self.registration.as_ref()?.generation;
        if registered != generation || self.sync_timer.is_none() || epoch != self.sync_epoch {
            return None;
        }
        self.sync_timer = None;

        error!(package = %self.package_name, "Timed out waiting for metadata to sync");
        Some(self.current_media_data())
    }

    fn cancel_sync_timer(&mut self) {
        if let Some(timer) = self.sync_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.unregister_callback();
    }
}

impl std::fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("package_name", &self.package_name)
            .field("registered", &self.is_registered())
            .finish()
    }
}
