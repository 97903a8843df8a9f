//! Playback controller.
//!
//! `Player` sits on the control thread and glues the engine selector, the
//! sequencer and the store together. Driver callbacks only post notices on a
//! channel; `tick` drains them so sequencing never runs inside a callback.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audio::{EngineSelector, ListenerId, StateListener};
use crate::config::Settings;
use crate::error::StoreResult;
use crate::library::{LibraryIndex, Track};
use crate::playlist::{PlaylistCollection, RepeatMode, Sequencer};
use crate::store::{JsonStore, Session};

const FADE_STEPS: u64 = 20;

/// Levels used to draw spectrum bands, quietest first.
const BAR_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, PartialEq)]
enum Notice {
    SongEnded,
    Error(String),
}

pub struct Player {
    selector: EngineSelector,
    sequencer: Sequencer,
    library: Vec<Track>,
    index: LibraryIndex,
    store: JsonStore,
    playlists: PlaylistCollection,
    notices: Receiver<Notice>,
    spectrum: Arc<Mutex<Vec<f32>>>,
    /// Position to restore once the resumed track reports its duration.
    pending_seek: Option<f64>,
    scrub_seconds: u64,
    quit_fade_out_ms: u64,
}

impl Player {
    /// Wire `selector` to a fresh sequencer over `library`.
    pub fn new(
        mut selector: EngineSelector,
        mut sequencer: Sequencer,
        library: Vec<Track>,
        store: JsonStore,
        settings: &Settings,
    ) -> StoreResult<Self> {
        let playlists = PlaylistCollection::load(store.clone())?;
        let index = store.load_index()?;
        let (tx, notices) = mpsc::channel();
        let spectrum = Arc::new(Mutex::new(Vec::new()));

        let ended_tx = tx.clone();
        selector.set_on_song_ended(Box::new(move || {
            let _ = ended_tx.send(Notice::SongEnded);
        }));
        selector.set_on_error(Box::new(move |msg: &str| {
            let _ = tx.send(Notice::Error(msg.to_string()));
        }));
        let bands = Arc::clone(&spectrum);
        selector.set_on_spectrum(Box::new(move |data: &[f32]| {
            if let Ok(mut b) = bands.lock() {
                b.clear();
                b.extend_from_slice(data);
            }
        }));
        selector.set_volume(settings.audio.default_volume);

        sequencer.set_playlist(library.clone());

        Ok(Self {
            selector,
            sequencer,
            library,
            index,
            store,
            playlists,
            notices,
            spectrum,
            pending_seek: None,
            scrub_seconds: settings.controls.scrub_seconds,
            quit_fade_out_ms: settings.audio.quit_fade_out_ms,
        })
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn playlists(&self) -> &PlaylistCollection {
        &self.playlists
    }

    pub fn scrub_seconds(&self) -> u64 {
        self.scrub_seconds
    }

    /// Latest spectrum bands, empty before the first delivery.
    pub fn spectrum(&self) -> Vec<f32> {
        self.spectrum.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Register a playback state listener on the selector.
    pub fn subscribe(&mut self, listener: StateListener) -> ListenerId {
        self.selector.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.selector.unsubscribe(id)
    }

    /// Drive the selector and react to what the backends reported.
    pub fn tick(&mut self) {
        self.selector.pump();

        if let Some(pos) = self.pending_seek {
            if self.selector.duration() > 0.0 {
                self.selector.seek(pos);
                self.pending_seek = None;
            }
        }

        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                Notice::SongEnded => self.on_song_ended(),
                Notice::Error(msg) => warn!(error = %msg, "playback error"),
            }
        }
    }

    fn on_song_ended(&mut self) {
        if let Some(finished) = self.selector.current_track().cloned() {
            self.record_play(&finished);
        }
        match self.sequencer.next() {
            Some(track) => {
                self.start(&track);
            }
            None => {
                info!("end of playlist");
                self.selector.stop();
            }
        }
    }

    fn record_play(&mut self, finished: &Track) {
        let Some(track) = self.library.iter_mut().find(|t| t.id == finished.id) else {
            return;
        };
        track.record_play(Utc::now());
        debug!(title = %track.title, plays = track.play_count, "play recorded");
        if let Err(e) = self.store.save_tracks(&self.library) {
            warn!(error = %e, "failed to save play statistics");
        }
    }

    fn start(&mut self, track: &Track) -> bool {
        self.pending_seek = None;
        if !self.selector.load_song(track) {
            return false;
        }
        info!(title = %track.display, "now playing");
        self.selector.play();
        true
    }

    /// Load the session's last track without starting it.
    ///
    /// The volume is restored and the position applied once the backend
    /// knows the duration.
    pub fn resume(&mut self, session: &Session) -> bool {
        self.selector.set_volume(session.last_volume);

        let Some(track) = session
            .last_track_id
            .and_then(|id| self.library.iter().find(|t| t.id == id))
            .cloned()
        else {
            return false;
        };

        if !self.selector.load_song(&track) {
            return false;
        }
        self.sequencer.select_track(&track);
        info!(title = %track.display, position = session.last_position, "resumed");
        if session.last_position > 0.0 {
            self.pending_seek = Some(session.last_position);
        }
        true
    }

    pub fn play_index(&mut self, index: usize) -> bool {
        match self.sequencer.select(index) {
            Some(track) => self.start(&track),
            None => false,
        }
    }

    pub fn next(&mut self) -> bool {
        match self.sequencer.next() {
            Some(track) => self.start(&track),
            None => false,
        }
    }

    pub fn previous(&mut self) -> bool {
        match self.sequencer.previous() {
            Some(track) => self.start(&track),
            None => false,
        }
    }

    /// Pause or resume. With nothing loaded, start the sequence.
    pub fn toggle_play(&mut self) {
        if self.selector.current_track().is_none() {
            match self.sequencer.current_track().cloned() {
                Some(track) => {
                    self.start(&track);
                }
                None => {
                    self.next();
                }
            }
        } else if self.selector.is_playing() {
            self.selector.pause();
        } else {
            self.selector.play();
        }
    }

    pub fn stop(&mut self) {
        self.selector.stop();
    }

    /// Scrub relative to the current position, clamped to the track.
    pub fn seek_by(&mut self, delta_secs: i64) {
        let duration = self.selector.duration();
        let target = (self.selector.position() + delta_secs as f64).clamp(0.0, duration.max(0.0));
        self.selector.seek(target);
    }

    pub fn seek_to(&mut self, secs: f64) {
        self.selector.seek(secs);
    }

    pub fn set_volume(&mut self, v: f32) {
        self.selector.set_volume(v);
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.sequencer.toggle_shuffle()
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.sequencer.cycle_repeat()
    }

    /// Queue the track at `index` of the current play order.
    pub fn queue_index(&mut self, index: usize) -> Option<Track> {
        let track = self.sequencer.tracks().get(index)?.clone();
        self.sequencer.queue_song(track.clone());
        Some(track)
    }

    pub fn clear_queue(&mut self) {
        self.sequencer.clear_queue();
    }

    /// Insert library track `library_index` into the play order at `at`.
    pub fn insert_track(&mut self, library_index: usize, at: usize) -> Option<Track> {
        let track = self.library.get(library_index)?.clone();
        self.sequencer.insert(at, track.clone());
        Some(track)
    }

    /// Drop the entry at `index` of the play order. The loaded track keeps
    /// playing even when it is the one removed.
    pub fn remove_index(&mut self, index: usize) -> Option<Track> {
        self.sequencer.remove(index)
    }

    /// Flip the favourite flag of the loaded track and save the library.
    pub fn toggle_favorite(&mut self) -> StoreResult<Option<bool>> {
        self.update_current(|t| {
            t.toggle_favorite();
            t.favorite
        })
    }

    /// Rate the loaded track, capped at five stars.
    pub fn rate_current(&mut self, stars: u8) -> StoreResult<Option<u8>> {
        self.update_current(|t| {
            t.set_rating(stars);
            t.rating
        })
    }

    fn update_current<T>(&mut self, change: impl FnOnce(&mut Track) -> T) -> StoreResult<Option<T>> {
        let Some(id) = self.selector.current_track().map(|t| t.id) else {
            return Ok(None);
        };
        let Some(track) = self.library.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        let out = change(track);
        self.store.save_tracks(&self.library)?;
        Ok(Some(out))
    }

    /// Make the album called `name` the play order. Returns its track count.
    pub fn load_album(&mut self, name: &str) -> Option<usize> {
        let tracks = self.index.album(name)?.tracks.clone();
        let count = tracks.len();
        self.load_playlist(tracks);
        info!(album = %name, count, "album loaded");
        Some(count)
    }

    /// Make every track by `name` the play order. Returns the track count.
    pub fn load_artist(&mut self, name: &str) -> Option<usize> {
        let tracks = self.index.artist(name)?.tracks.clone();
        let count = tracks.len();
        self.load_playlist(tracks);
        info!(artist = %name, count, "artist loaded");
        Some(count)
    }

    /// Replace the play order. Playback of the loaded track continues.
    pub fn load_playlist(&mut self, tracks: Vec<Track>) {
        self.sequencer.set_playlist(tracks);
    }

    /// Append the loaded track to the saved playlist `name`, creating it when
    /// missing. Returns whether the playlist changed.
    pub fn add_current_to_playlist(&mut self, name: &str) -> StoreResult<bool> {
        let Some(track) = self.selector.current_track().cloned() else {
            return Ok(false);
        };
        let id = match self.playlists.find_by_name(name) {
            Some(p) => p.id,
            None => self.playlists.create(name)?,
        };
        self.playlists.add_track(id, track)
    }

    /// Make the saved playlist at `index` the play order.
    pub fn open_saved_playlist(&mut self, index: usize) -> Option<String> {
        let playlist = self.playlists.playlists().get(index)?;
        let name = playlist.name.clone();
        let tracks = playlist.tracks.clone();
        self.load_playlist(tracks);
        info!(name = %name, "playlist opened");
        Some(name)
    }

    pub fn rename_playlist(&mut self, index: usize, name: &str) -> StoreResult<bool> {
        let Some(id) = self.playlists.playlists().get(index).map(|p| p.id) else {
            return Ok(false);
        };
        self.playlists.rename(id, name)?;
        Ok(true)
    }

    pub fn delete_playlist(&mut self, index: usize) -> StoreResult<Option<String>> {
        let Some(id) = self.playlists.playlists().get(index).map(|p| p.id) else {
            return Ok(None);
        };
        Ok(Some(self.playlists.delete(id)?.name))
    }

    /// Remove entry `track` of saved playlist `index`.
    pub fn remove_from_playlist(&mut self, index: usize, track: usize) -> StoreResult<Option<Track>> {
        let Some(id) = self.playlists.playlists().get(index).map(|p| p.id) else {
            return Ok(None);
        };
        self.playlists.remove_track(id, track).map(Some)
    }

    pub fn session(&self) -> Session {
        Session {
            last_track_id: self.selector.current_track().map(|t| t.id),
            last_position: self.selector.position(),
            last_volume: self.selector.volume(),
        }
    }

    /// One-line summary of what is playing.
    pub fn status(&self) -> String {
        let state = self.selector.snapshot();
        let title = state
            .current_track
            .as_ref()
            .map_or("nothing loaded", |t| t.display.as_str());
        let mark = if state.playing { ">" } else { "||" };
        let slot = self
            .sequencer
            .current_index()
            .map_or_else(|| "-".to_string(), |i| (i + 1).to_string());
        let mut line = format!(
            "{mark} {title} [{}] #{slot}/{} {:.1}/{:.1}s vol {:.2} shuffle {} repeat {} queued {}",
            self.selector.active_driver().name(),
            self.sequencer.len(),
            state.position,
            state.duration,
            state.volume,
            if self.sequencer.is_shuffle() { "on" } else { "off" },
            self.sequencer.repeat().label(),
            self.sequencer.queue_len(),
        );
        let bars = spectrum_bars(&self.spectrum());
        if !bars.is_empty() {
            line.push(' ');
            line.push_str(&bars);
        }
        line
    }

    /// Save the session, fade out and release both backends.
    pub fn quit(&mut self) {
        if let Err(e) = self.store.save_session(&self.session()) {
            warn!(error = %e, "failed to save session");
        }
        if self.selector.is_playing() {
            self.fade_out();
        }
        self.selector.dispose();
    }

    fn fade_out(&mut self) {
        let start = self.selector.volume();
        if self.quit_fade_out_ms == 0 {
            self.selector.set_volume(0.0);
            return;
        }
        let step_ms = (self.quit_fade_out_ms / FADE_STEPS).max(1);
        for step in 1..=FADE_STEPS {
            let t = step as f32 / FADE_STEPS as f32;
            self.selector.set_volume(start * (1.0 - t));
            thread::sleep(Duration::from_millis(step_ms));
        }
    }
}

/// One block character per band; bands are expected in `0.0..=1.0`.
fn spectrum_bars(bands: &[f32]) -> String {
    let top = (BAR_LEVELS.len() - 1) as f32;
    bands
        .iter()
        .map(|b| BAR_LEVELS[(b.clamp(0.0, 1.0) * top).round() as usize])
        .collect()
}

#[cfg(test)]
mod tests;
