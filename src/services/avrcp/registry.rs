use std::collections::{BTreeMap, HashMap};

use super::{
    browsed_player::BrowsedPlayer,
    error::TargetError,
    media_player::MediaPlayer,
    types::{SourceCapabilities, SourceId},
};

/// Id allocation and lookup for every known source.
///
/// A package keeps its id for as long as it is registered in either role,
/// so a player that is both browsable and has a live session appears under
/// one id. Ids are released once neither role remains and are then reused,
/// smallest first.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    ids: HashMap<String, SourceId>,
    media_players: BTreeMap<SourceId, MediaPlayer>,
    browsable: BTreeMap<SourceId, BrowsedPlayer>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id assigned to a package, if any.
    pub fn id_for(&self, package_name: &str) -> Option<SourceId> {
        self.ids.get(package_name).copied()
    }

    /// Returns the package's id, assigning the smallest free one if needed.
    ///
    /// # Errors
    /// Returns [`TargetError::IdsExhausted`] if every two digit id is taken.
    pub fn allocate(&mut self, package_name: &str) -> Result<SourceId, TargetError> {
        if let Some(id) = self.id_for(package_name) {
            return Ok(id);
        }

        let id = (1..=SourceId::MAX)
            .filter_map(SourceId::new)
            .find(|candidate| !self.ids.values().any(|used| used == candidate))
            .ok_or_else(|| TargetError::IdsExhausted(package_name.to_string()))?;

        self.ids.insert(package_name.to_string(), id);
        Ok(id)
    }

    /// Registers a session under `id`, returning the one it replaces.
    pub fn insert_media_player(&mut self, id: SourceId, player: MediaPlayer) -> Option<MediaPlayer> {
        self.media_players.insert(id, player)
    }

    /// Registers a browse service under `id`.
    pub fn insert_browsable(&mut self, id: SourceId, player: BrowsedPlayer) -> Option<BrowsedPlayer> {
        self.browsable.insert(id, player)
    }

    /// Removes the session registered under `id`.
    ///
    /// The package's id is released unless it is still browsable.
    pub fn remove_media_player(&mut self, id: SourceId) -> Option<MediaPlayer> {
        let player = self.media_players.remove(&id)?;
        if !self.browsable.contains_key(&id) {
            self.ids.remove(player.package_name());
        }
        Some(player)
    }

    /// Session registered under `id`.
    pub fn media_player(&self, id: SourceId) -> Option<&MediaPlayer> {
        self.media_players.get(&id)
    }

    /// Mutable access to the session registered under `id`.
    pub fn media_player_mut(&mut self, id: SourceId) -> Option<&mut MediaPlayer> {
        self.media_players.get_mut(&id)
    }

    /// Browse service registered under `id`.
    pub fn browsable(&self, id: SourceId) -> Option<&BrowsedPlayer> {
        self.browsable.get(&id)
    }

    /// Whether a session is registered under `id`.
    pub fn has_media_player(&self, id: SourceId) -> bool {
        self.media_players.contains_key(&id)
    }

    /// Id of the package's registered session, if it has one.
    ///
    /// A package that is only browsable has an id but no session.
    pub fn media_player_id_for(&self, package_name: &str) -> Option<SourceId> {
        self.id_for(package_name)
            .filter(|id| self.has_media_player(*id))
    }

    /// Whether a browse service is registered under `id`.
    pub fn has_browsable(&self, id: SourceId) -> bool {
        self.browsable.contains_key(&id)
    }

    /// Whether the package has a registered browse service.
    pub fn has_browsable_for(&self, package_name: &str) -> bool {
        self.id_for(package_name).is_some_and(|id| self.has_browsable(id))
    }

    /// What the source registered under `id` can do.
    pub fn capabilities(&self, id: SourceId) -> SourceCapabilities {
        let mut capabilities = SourceCapabilities::empty();
        capabilities.set(SourceCapabilities::ACTIVE_SESSION, self.has_media_player(id));
        capabilities.set(SourceCapabilities::BROWSABLE, self.has_browsable(id));
        capabilities
    }

    /// Registered sessions, by ascending id.
    pub fn media_players(&self) -> impl Iterator<Item = (SourceId, &MediaPlayer)> {
        self.media_players.iter().map(|(id, player)| (*id, player))
    }

    /// Registered browse services, by ascending id.
    pub fn browsable_players(&self) -> impl Iterator<Item = (SourceId, &BrowsedPlayer)> {
        self.browsable.iter().map(|(id, player)| (*id, player))
    }

    /// Number of registered browse services.
    pub fn browsable_count(&self) -> usize {
        self.browsable.len()
    }

    /// Drops every session, stopping their callbacks.
    pub fn clear_media_players(&mut self) {
        let ids: Vec<SourceId> = self.media_players.keys().copied().collect();
        for id in ids {
            self.remove_media_player(id);
        }
    }
}
