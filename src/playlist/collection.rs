//! Named user playlists, persisted after every change.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::library::Track;
use crate::store::JsonStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tracks: Vec::new(),
        }
    }
}

pub struct PlaylistCollection {
    playlists: Vec<Playlist>,
    store: JsonStore,
}

impl PlaylistCollection {
    /// Load the saved playlists from `store`.
    pub fn load(store: JsonStore) -> StoreResult<Self> {
        let playlists = store.load_playlists()?;
        Ok(Self { playlists, store })
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn create(&mut self, name: impl Into<String>) -> StoreResult<Uuid> {
        let playlist = Playlist::new(name);
        let id = playlist.id;
        info!(name = %playlist.name, "playlist created");
        self.playlists.push(playlist);
        self.save()?;
        Ok(id)
    }

    pub fn rename(&mut self, id: Uuid, name: impl Into<String>) -> StoreResult<()> {
        self.get_mut(id)?.name = name.into();
        self.save()
    }

    pub fn delete(&mut self, id: Uuid) -> StoreResult<Playlist> {
        let pos = self
            .playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::PlaylistNotFound(id))?;
        let removed = self.playlists.remove(pos);
        self.save()?;
        Ok(removed)
    }

    /// Append `track` unless an equal track is already listed.
    ///
    /// Returns whether the playlist changed.
    pub fn add_track(&mut self, id: Uuid, track: Track) -> StoreResult<bool> {
        let playlist = self.get_mut(id)?;
        if playlist.tracks.contains(&track) {
            return Ok(false);
        }
        playlist.tracks.push(track);
        self.save()?;
        Ok(true)
    }

    pub fn remove_track(&mut self, id: Uuid, index: usize) -> StoreResult<Track> {
        let playlist = self.get_mut(id)?;
        if index >= playlist.tracks.len() {
            return Err(StoreError::TrackOutOfRange { playlist: id, index });
        }
        let removed = playlist.tracks.remove(index);
        self.save()?;
        Ok(removed)
    }

    fn get_mut(&mut self, id: Uuid) -> StoreResult<&mut Playlist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::PlaylistNotFound(id))
    }

    fn save(&self) -> StoreResult<()> {
        self.store.save_playlists(&self.playlists)
    }
}
