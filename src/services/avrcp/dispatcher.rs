use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{MediaData, Metadata, TargetUpdate, playback_states_equal};

/// Pushes updates to the protocol layer, suppressing ones that change nothing.
///
/// Keeps the last dispatched [`MediaData`] as the baseline for change
/// detection. The baseline only moves when an update is actually sent.
#[derive(Debug)]
pub struct UpdateDispatcher {
    updates: mpsc::UnboundedSender<TargetUpdate>,
    current: MediaData,
}

impl UpdateDispatcher {
    /// Create a dispatcher writing to `updates`.
    pub fn new(updates: mpsc::UnboundedSender<TargetUpdate>) -> Self {
        Self {
            updates,
            current: MediaData::default(),
        }
    }

    /// Last dispatched media data.
    pub fn current(&self) -> &MediaData {
        &self.current
    }

    /// Sends `data` if it differs from the last update.
    ///
    /// An empty queue is replaced by a one item queue holding the current
    /// track. Returns whether anything was sent.
    pub fn push_media_update(&mut self, mut data: MediaData) -> bool {
        if data.queue.is_empty() {
            debug!("Creating a one item queue for a player with no queue");
            data.queue
                .push(data.metadata.clone().unwrap_or_else(Metadata::empty));
        }

        let metadata_changed = self.current.metadata != data.metadata;
        let state_changed =
            !playback_states_equal(self.current.state.as_ref(), data.state.as_ref());
        let queue_changed = self.current.queue != data.queue;

        if !(metadata_changed || state_changed || queue_changed) {
            debug!("Media update carries no changes, skipping");
            return false;
        }

        info!(
            metadata_changed,
            state_changed, queue_changed, "Sending media update"
        );

        self.current = data.clone();
        self.send(TargetUpdate::Media {
            metadata_changed,
            state_changed,
            queue_changed,
            data,
        });
        true
    }

    /// Forwards a player list or browse tree change.
    pub fn push_folder_update(
        &self,
        available_players_changed: bool,
        addressed_player_changed: bool,
        uids_changed: bool,
    ) {
        info!(
            available_players_changed,
            addressed_player_changed, uids_changed, "Sending folder update"
        );

        self.send(TargetUpdate::Folder {
            available_players_changed,
            addressed_player_changed,
            uids_changed,
        });
    }

    fn send(&self, update: TargetUpdate) {
        if self.updates.send(update).is_err() {
            warn!("Update receiver dropped, update lost");
        }
    }
}
