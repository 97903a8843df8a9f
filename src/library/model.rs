use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest accepted star rating.
pub const MAX_RATING: u8 = 5;

/// One playable audio item.
///
/// Equality and hashing only look at the descriptive fields (location and
/// tags). Identity, play statistics, favourite flag, rating and the derived
/// display string are ignored, so two scans of the same file compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: Option<Duration>,
    pub track_number: Option<u32>,
    pub year: Option<u32>,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub rating: u8,
    pub display: String,
}

impl Track {
    /// Build a track for `path` with only a title; other tags empty.
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            display: title.clone(),
            title,
            artist: None,
            album: None,
            genre: None,
            duration: None,
            track_number: None,
            year: None,
            play_count: 0,
            last_played: None,
            favorite: false,
            rating: 0,
        }
    }

    /// Lowercase extension of the track location, empty when there is none.
    pub fn extension(&self) -> String {
        crate::audio::extension_of(&self.path)
    }

    /// Duration in seconds, `0.0` when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map_or(0.0, |d| d.as_secs_f64())
    }

    pub fn set_rating(&mut self, rating: u8) {
        self.rating = rating.min(MAX_RATING);
    }

    pub fn toggle_favorite(&mut self) {
        self.favorite = !self.favorite;
    }

    /// Count one completed playback.
    pub(crate) fn record_play(&mut self, at: DateTime<Utc>) {
        self.play_count = self.play_count.saturating_add(1);
        self.last_played = Some(at);
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
            && self.genre == other.genre
            && self.duration == other.duration
            && self.track_number == other.track_number
            && self.year == other.year
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.title.hash(state);
        self.artist.hash(state);
        self.album.hash(state);
        self.genre.hash(state);
        self.duration.hash(state);
        self.track_number.hash(state);
        self.year.hash(state);
    }
}
