//! Bounded play history, most recent first.

use std::collections::VecDeque;

use crate::library::Track;

/// Maximum number of tracks kept in the history.
pub const HISTORY_LIMIT: usize = 100;

/// Recently left tracks, newest at the front.
///
/// Entries are unique by value: pushing a track that is already present
/// moves it to the front.
#[derive(Debug, Clone, Default)]
pub struct History {
    tracks: VecDeque<Track>,
}

impl History {
    pub fn push(&mut self, track: Track) {
        if let Some(pos) = self.tracks.iter().position(|t| *t == track) {
            self.tracks.remove(pos);
        }
        self.tracks.push_front(track);
        self.tracks.truncate(HISTORY_LIMIT);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> Track {
        Track::new(format!("/music/{name}.mp3"), name)
    }

    #[test]
    fn newest_first() {
        let mut h = History::default();
        h.push(t("a"));
        h.push(t("b"));
        let titles: Vec<_> = h.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[test]
    fn repeat_push_moves_to_front() {
        let mut h = History::default();
        h.push(t("a"));
        h.push(t("b"));
        h.push(t("c"));
        h.push(t("a"));
        let titles: Vec<_> = h.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "b"]);
    }

    #[test]
    fn dedup_is_by_value_not_identity() {
        let mut h = History::default();
        h.push(t("a"));
        // Fresh id, same descriptive fields.
        h.push(t("a"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn capped_at_limit_dropping_oldest() {
        let mut h = History::default();
        for i in 0..=HISTORY_LIMIT {
            h.push(t(&format!("t{i}")));
        }
        assert_eq!(h.len(), HISTORY_LIMIT);
        assert_eq!(h.iter().next().unwrap().title, format!("t{HISTORY_LIMIT}"));
        assert!(h.iter().all(|t| t.title != "t0"));
    }
}
