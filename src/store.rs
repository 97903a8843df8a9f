//! JSON persistence for the library, indexes, playlists and session.
//!
//! Every file is written whole through a temporary sibling and renamed into
//! place. A missing file loads as the type's default.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::library::{LibraryIndex, Track};
use crate::playlist::Playlist;

const TRACKS_FILE: &str = "tracks.json";
const INDEX_FILE: &str = "index.json";
const PLAYLISTS_FILE: &str = "playlists.json";
const SESSION_FILE: &str = "session.json";

/// What is needed to pick playback up where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub last_track_id: Option<Uuid>,
    /// Seconds into the last track.
    pub last_position: f64,
    pub last_volume: f32,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            last_track_id: None,
            last_position: 0.0,
            last_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Use `dir` as the data directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn save_tracks(&self, tracks: &[Track]) -> StoreResult<()> {
        self.save(TRACKS_FILE, tracks)
    }

    pub fn load_tracks(&self) -> StoreResult<Vec<Track>> {
        self.load(TRACKS_FILE)
    }

    pub fn save_index(&self, index: &LibraryIndex) -> StoreResult<()> {
        self.save(INDEX_FILE, index)
    }

    pub fn load_index(&self) -> StoreResult<LibraryIndex> {
        self.load(INDEX_FILE)
    }

    pub fn save_playlists(&self, playlists: &[Playlist]) -> StoreResult<()> {
        self.save(PLAYLISTS_FILE, playlists)
    }

    pub fn load_playlists(&self) -> StoreResult<Vec<Playlist>> {
        self.load(PLAYLISTS_FILE)
    }

    pub fn save_session(&self, session: &Session) -> StoreResult<()> {
        self.save(SESSION_FILE, session)
    }

    pub fn load_session(&self) -> StoreResult<Session> {
        self.load(SESSION_FILE)
    }

    fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> StoreResult<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "saved");
        Ok(())
    }

    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> StoreResult<T> {
        let path = self.dir.join(name);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&json).map_err(|source| StoreError::Json { path, source })
    }
}

#[cfg(test)]
mod tests;
