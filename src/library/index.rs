use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::Track;

const UNKNOWN_ALBUM: &str = "Unknown Album";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    pub artist: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    pub albums: Vec<String>,
    pub tracks: Vec<Track>,
}

/// Album and artist views over a track list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryIndex {
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

impl LibraryIndex {
    /// Group `tracks` by album and by artist.
    ///
    /// Equal tracks (by value) are only listed once per entry. Albums are
    /// keyed by `(album, artist)` so same-named records by different artists
    /// stay apart. Album tracks follow track number, then title.
    pub fn build(tracks: &[Track]) -> Self {
        let mut albums: BTreeMap<(String, String), Vec<Track>> = BTreeMap::new();
        let mut artists: BTreeMap<String, (Vec<String>, Vec<Track>)> = BTreeMap::new();

        for t in tracks {
            let album = t.album.clone().unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
            let artist = t.artist.clone().unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

            push_unique(
                albums.entry((album.clone(), artist.clone())).or_default(),
                t.clone(),
            );

            let (artist_albums, artist_tracks) = artists.entry(artist).or_default();
            push_unique(artist_albums, album);
            push_unique(artist_tracks, t.clone());
        }

        let albums = albums
            .into_iter()
            .map(|((name, artist), mut tracks)| {
                tracks.sort_by(|a, b| {
                    a.track_number
                        .unwrap_or(u32::MAX)
                        .cmp(&b.track_number.unwrap_or(u32::MAX))
                        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
                });
                Album {
                    name,
                    artist,
                    tracks,
                }
            })
            .collect();

        let artists = artists
            .into_iter()
            .map(|(name, (albums, tracks))| Artist {
                name,
                albums,
                tracks,
            })
            .collect();

        Self { albums, artists }
    }

    pub fn album(&self, name: &str) -> Option<&Album> {
        self.albums.iter().find(|a| a.name == name)
    }

    pub fn artist(&self, name: &str) -> Option<&Artist> {
        self.artists.iter().find(|a| a.name == name)
    }
}
