use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use lofty::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::display::display_for;
use super::model::Track;

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Leading number of tags like `"3/12"` or `"1998-04-01"`.
fn leading_number(v: &str) -> Option<u32> {
    let digits: String = v.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Read tags for `path` into a fresh `Track`. Unreadable tags leave the
/// file stem as the title.
fn read_track(path: &Path, settings: &LibrarySettings) -> Track {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let mut track = Track::new(path, stem);

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            track.duration = Some(tagged.properties().duration());

            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(v) = non_empty(tag.get_string(&ItemKey::TrackTitle)) {
                    track.title = v;
                }
                track.artist = non_empty(tag.get_string(&ItemKey::TrackArtist));
                track.album = non_empty(tag.get_string(&ItemKey::AlbumTitle));
                track.genre = non_empty(tag.get_string(&ItemKey::Genre));
                track.track_number = tag
                    .get_string(&ItemKey::TrackNumber)
                    .and_then(leading_number);
                track.year = tag
                    .get_string(&ItemKey::RecordingDate)
                    .and_then(leading_number)
                    .filter(|y| *y > 0);
            }
        }
        Err(e) => debug!(path = %path.display(), error = %e, "no readable tags"),
    }

    track.display = display_for(&track, &settings.display_fields, &settings.display_separator);
    track
}

/// Scan `dir` for audio files and build one `Track` per file.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut tracks: Vec<Track> = Vec::new();

    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable library entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_file()
            && (settings.include_hidden || !is_hidden(path))
            && is_audio_file(path, settings)
        {
            tracks.push(read_track(path, settings));
        }
    }

    tracks.sort_by(|a, b| a.display.to_lowercase().cmp(&b.display.to_lowercase()));
    debug!(dir = %dir.display(), count = tracks.len(), "library scan finished");
    tracks
}

/// Keep identity and user data from `known` for files scanned again.
///
/// Matching is by path; tags are taken from the fresh scan.
pub fn carry_over(mut scanned: Vec<Track>, known: &[Track]) -> Vec<Track> {
    let by_path: HashMap<&Path, &Track> = known.iter().map(|t| (t.path.as_path(), t)).collect();
    for track in &mut scanned {
        if let Some(old) = by_path.get(track.path.as_path()) {
            track.id = old.id;
            track.play_count = old.play_count;
            track.last_played = old.last_played;
            track.favorite = old.favorite;
            track.rating = old.rating;
        }
    }
    scanned
}

/// Ask the tag reader for the stream duration of `path`.
///
/// Used by playback workers when the decoder cannot tell.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    lofty::read_from_path(path)
        .ok()
        .map(|tagged| tagged.properties().duration())
        .filter(|d| !d.is_zero())
}
