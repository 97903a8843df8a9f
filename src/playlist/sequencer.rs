//! Play-order state machine: order lists, cursor, repeat, queue and history.
//!
//! The sequencer only answers "what plays next"; it never touches audio.
//! It is owned by the control thread and has no internal locking.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::RepeatModeSetting;
use crate::library::Track;

use super::history::History;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at the end of the list.
    #[default]
    None,
    /// Replay the current track on every `next`.
    One,
    /// Wrap around at either end.
    All,
}

impl RepeatMode {
    /// Cycle `None -> All -> One -> None`.
    pub fn cycle(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::One => "one",
            Self::All => "all",
        }
    }
}

impl From<RepeatModeSetting> for RepeatMode {
    fn from(s: RepeatModeSetting) -> Self {
        match s {
            RepeatModeSetting::None => Self::None,
            RepeatModeSetting::One => Self::One,
            RepeatModeSetting::All => Self::All,
        }
    }
}

pub struct Sequencer {
    /// Tracks in load order.
    original: Vec<Track>,
    /// Same tracks, reordered while shuffle is on.
    current: Vec<Track>,
    /// Cursor into `current`.
    index: Option<usize>,
    history: History,
    queue: VecDeque<Track>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic shuffling, for reproducible orders.
    #[cfg(test)]
    pub(crate) fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            original: Vec::new(),
            current: Vec::new(),
            index: None,
            history: History::default(),
            queue: VecDeque::new(),
            shuffle: false,
            repeat: RepeatMode::default(),
            rng,
        }
    }

    /// Replace the playlist. The cursor is unset and the queue cleared;
    /// history survives. An active shuffle reshuffles the new list.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        self.original = tracks.clone();
        self.current = tracks;
        self.index = None;
        self.queue.clear();
        if self.shuffle {
            self.current.shuffle(&mut self.rng);
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.current
    }

    #[cfg(test)]
    pub(crate) fn original_order(&self) -> &[Track] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.index.and_then(|i| self.current.get(i))
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    /// Advance and return the track to play.
    ///
    /// Queued tracks win and leave the cursor alone. Repeat-one replays the
    /// current track. Otherwise the cursor moves and the track it leaves is
    /// recorded in the history.
    pub fn next(&mut self) -> Option<Track> {
        if let Some(queued) = self.queue.pop_front() {
            if let Some(prev) = self.current_track().cloned() {
                self.history.push(prev);
            }
            return Some(queued);
        }

        if self.repeat == RepeatMode::One {
            if let Some(current) = self.current_track() {
                return Some(current.clone());
            }
        }

        let next = self.next_index()?;
        if let Some(prev) = self.current_track().cloned() {
            self.history.push(prev);
        }
        self.index = Some(next);
        self.current.get(next).cloned()
    }

    /// Step back. Ignores the queue and does not record history.
    pub fn previous(&mut self) -> Option<Track> {
        if self.repeat == RepeatMode::One {
            if let Some(current) = self.current_track() {
                return Some(current.clone());
            }
        }

        let prev = self.previous_index()?;
        self.index = Some(prev);
        self.current.get(prev).cloned()
    }

    fn next_index(&mut self) -> Option<usize> {
        let len = self.current.len();
        if len == 0 {
            return None;
        }
        if self.shuffle {
            return self.random_index();
        }
        match self.index {
            None => Some(0),
            Some(i) if i + 1 < len => Some(i + 1),
            Some(_) => (self.repeat == RepeatMode::All).then_some(0),
        }
    }

    fn previous_index(&mut self) -> Option<usize> {
        let len = self.current.len();
        if len == 0 {
            return None;
        }
        if self.shuffle {
            return self.random_index();
        }
        match self.index {
            Some(i) if i > 0 => Some(i - 1),
            _ => (self.repeat == RepeatMode::All).then_some(len - 1),
        }
    }

    /// Uniform pick that never lands on the current index when there is a choice.
    fn random_index(&mut self) -> Option<usize> {
        let len = self.current.len();
        match (len, self.index) {
            (0, _) => None,
            (1, None) => Some(0),
            (1, Some(_)) => (self.repeat == RepeatMode::All).then_some(0),
            (_, None) => Some(self.rng.gen_range(0..len)),
            (_, Some(cur)) => {
                let r = self.rng.gen_range(0..len - 1);
                Some(if r >= cur { r + 1 } else { r })
            }
        }
    }

    /// Fisher-Yates over a fresh copy of the load order. The current track
    /// stays current at its new position.
    pub fn shuffle_playlist(&mut self) {
        let mut order = self.original.clone();
        order.shuffle(&mut self.rng);
        self.reorder(order);
        self.shuffle = true;
    }

    /// Back to load order, keeping the current track.
    pub fn reset_order(&mut self) {
        self.reorder(self.original.clone());
        self.shuffle = false;
    }

    pub fn set_shuffle(&mut self, on: bool) {
        if on {
            self.shuffle_playlist();
        } else {
            self.reset_order();
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.set_shuffle(!self.shuffle);
        self.shuffle
    }

    fn reorder(&mut self, order: Vec<Track>) {
        let current = self.current_track().cloned();
        self.current = order;
        self.index = current.and_then(|t| self.current.iter().position(|x| *x == t));
    }

    pub fn queue_song(&mut self, track: Track) {
        self.queue.push_back(track);
    }

    pub fn queue(&self) -> impl Iterator<Item = &Track> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Jump to `index`. The track being left goes to the history.
    pub fn select(&mut self, index: usize) -> Option<Track> {
        let track = self.current.get(index)?.clone();
        if self.index != Some(index) {
            if let Some(prev) = self.current_track().cloned() {
                self.history.push(prev);
            }
        }
        self.index = Some(index);
        Some(track)
    }

    /// Jump to the first track equal to `track`.
    pub fn select_track(&mut self, track: &Track) -> Option<Track> {
        let index = self.current.iter().position(|t| t == track)?;
        self.select(index)
    }

    /// Insert at `index` (clamped to the end) in both orders.
    pub fn insert(&mut self, index: usize, track: Track) {
        let at = index.min(self.current.len());
        let original_at = index.min(self.original.len());
        self.original.insert(original_at, track.clone());
        self.current.insert(at, track);
        if let Some(cur) = self.index {
            if at <= cur {
                self.index = Some(cur + 1);
            }
        }
    }

    /// Remove the track at `index` of the current order.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.current.len() {
            return None;
        }
        let removed = self.current.remove(index);
        if let Some(pos) = self.original.iter().position(|t| *t == removed) {
            self.original.remove(pos);
        }

        self.index = match self.index {
            Some(cur) if index < cur => Some(cur - 1),
            Some(cur) if index == cur => (!self.current.is_empty()).then_some(0),
            other => other,
        };
        Some(removed)
    }
}
