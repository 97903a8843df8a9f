use crate::config::TrackDisplayField;

use super::model::Track;

/// Build the display string for `track` from the configured `fields`.
///
/// Empty or missing tags are skipped; when nothing remains the title is used.
pub fn display_for(track: &Track, fields: &[TrackDisplayField], sep: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    let mut push_opt = |v: Option<&str>| {
        if let Some(v) = v.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(v.to_string());
        }
    };

    for f in fields {
        match f {
            TrackDisplayField::Title => push_opt(Some(&track.title)),
            TrackDisplayField::Artist => push_opt(track.artist.as_deref()),
            TrackDisplayField::Album => push_opt(track.album.as_deref()),
            TrackDisplayField::Genre => push_opt(track.genre.as_deref()),
            TrackDisplayField::Year => {
                let year = track.year.map(|y| y.to_string());
                push_opt(year.as_deref());
            }
            TrackDisplayField::Filename => {
                push_opt(track.path.file_stem().and_then(|s| s.to_str()));
            }
            TrackDisplayField::Path => {
                let p = track.path.display().to_string();
                push_opt(Some(&p));
            }
        }
    }

    if parts.is_empty() {
        track.title.clone()
    } else {
        parts.join(sep)
    }
}
