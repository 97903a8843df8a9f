//! One driver-shaped facade over both backends.
//!
//! The selector owns exactly two drivers and an `active` discriminant.
//! Switching backends moves the discriminant, the single-slot callbacks and
//! the volume; neither driver is ever rebuilt by a switch.

use tracing::{debug, info, warn};

use crate::library::Track;

use super::driver::{Driver, check_readable};
use super::formats::{Platform, select_driver};
use super::types::{
    DriverEvent, DriverKind, ErrorCallback, PlaybackState, SongEndedCallback, SpectrumCallback,
    StateListener, WorkerTuning, clamp_volume,
};

/// Handle returned by `subscribe`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct EngineSelector {
    rodio: Driver,
    symphonia: Driver,
    active: DriverKind,
    platform: Platform,
    state: PlaybackState,
    listeners: Vec<(ListenerId, StateListener)>,
    next_listener: u64,
    last_notified: Option<PlaybackState>,
}

impl EngineSelector {
    pub fn new(tuning: WorkerTuning) -> Self {
        Self::from_drivers(
            Driver::new_rodio(tuning),
            Driver::new_symphonia(tuning),
            Platform::current(),
        )
    }

    pub(crate) fn from_drivers(rodio: Driver, symphonia: Driver, platform: Platform) -> Self {
        let active = DriverKind::default();
        Self {
            rodio,
            symphonia,
            active,
            platform,
            state: PlaybackState {
                driver: active,
                ..PlaybackState::default()
            },
            listeners: Vec::new(),
            next_listener: 0,
            last_notified: None,
        }
    }

    pub fn active_driver(&self) -> DriverKind {
        self.active
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn position(&self) -> f64 {
        self.state.position
    }

    pub fn duration(&self) -> f64 {
        self.state.duration
    }

    pub fn volume(&self) -> f32 {
        self.state.volume
    }

    /// Route `track` to its backend, switching if needed, and load it.
    ///
    /// Returns `false` (after firing the error callback) when the file is
    /// missing or the backend rejects it.
    pub fn load_song(&mut self, track: &Track) -> bool {
        // Rejected before routing so a bad file never stops or swaps backends.
        if let Err(err) = check_readable(track) {
            let message = err.to_string();
            warn!("{message}");
            self.active_mut().report_error(&message);
            return false;
        }

        let ext = track.extension();
        let route = select_driver(&ext, self.platform);
        if !route.recognized {
            warn!(
                ext = %ext,
                driver = route.driver.name(),
                "unrecognized format, using default driver"
            );
        }

        self.switch_to(route.driver);

        if !self.active_mut().load(track) {
            return false;
        }

        info!(driver = self.active.name(), title = %track.title, "track loaded");
        self.state.current_track = Some(track.clone());
        self.state.playing = false;
        self.state.position = 0.0;
        self.state.duration = 0.0;
        self.notify();
        true
    }

    fn switch_to(&mut self, target: DriverKind) {
        if target == self.active {
            return;
        }
        debug!(from = self.active.name(), to = target.name(), "switching driver");

        let volume = self.driver(self.active).volume();
        let old = self.driver_mut(self.active);
        if old.is_playing() {
            old.stop();
        }
        old.discard_pending();
        let callbacks = old.take_callbacks();

        let new = self.driver_mut(target);
        new.install_callbacks(callbacks);
        new.set_volume(volume);

        // Observers see the new attribution with nothing playing.
        self.active = target;
        self.state.driver = target;
        self.state.current_track = None;
        self.state.playing = false;
        self.state.position = 0.0;
        self.state.duration = 0.0;
        self.notify();
    }

    pub fn play(&mut self) {
        self.active_mut().play();
        self.sync_from_active();
    }

    pub fn pause(&mut self) {
        self.active_mut().pause();
        self.sync_from_active();
    }

    pub fn stop(&mut self) {
        self.active_mut().stop();
        self.sync_from_active();
    }

    pub fn seek(&mut self, secs: f64) {
        self.active_mut().seek(secs);
        self.sync_from_active();
    }

    pub fn set_volume(&mut self, v: f32) {
        let Some(v) = clamp_volume(v) else {
            return;
        };
        self.state.volume = v;
        self.active_mut().set_volume(v);
        self.notify();
    }

    pub fn set_on_song_ended(&mut self, cb: SongEndedCallback) {
        self.active_mut().set_on_song_ended(cb);
    }

    pub fn set_on_error(&mut self, cb: ErrorCallback) {
        self.active_mut().set_on_error(cb);
    }

    pub fn set_on_spectrum(&mut self, cb: SpectrumCallback) {
        self.active_mut().set_on_spectrum(cb);
    }

    pub fn subscribe(&mut self, listener: StateListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Apply queued backend events on the calling (control) thread.
    ///
    /// The inactive driver is drained so stale messages cannot pile up, but
    /// only the active driver's events reach the playback state.
    pub fn pump(&mut self) -> Vec<DriverEvent> {
        let inactive = match self.active {
            DriverKind::Rodio => DriverKind::Symphonia,
            DriverKind::Symphonia => DriverKind::Rodio,
        };
        let _ = self.driver_mut(inactive).poll();

        let events = self.active_mut().poll();
        if !events.is_empty() {
            self.sync_from_active();
        }
        events
    }

    /// Release both backends and reset the playback state. Safe to repeat.
    pub fn dispose(&mut self) {
        self.rodio.dispose();
        self.symphonia.dispose();
        self.state = PlaybackState {
            volume: self.state.volume,
            driver: self.active,
            ..PlaybackState::default()
        };
        self.notify();
    }

    fn sync_from_active(&mut self) {
        let driver = self.driver(self.active);
        let playing = driver.is_playing();
        let position = driver.position();
        let duration = driver.duration();
        let current = driver.current_track().cloned();

        self.state.playing = playing;
        self.state.position = position;
        self.state.duration = duration;
        self.state.current_track = current;
        self.notify();
    }

    fn notify(&mut self) {
        if self.last_notified.as_ref() == Some(&self.state) {
            return;
        }
        let snapshot = self.state.clone();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&snapshot);
        }
        self.last_notified = Some(snapshot);
    }

    fn driver(&self, kind: DriverKind) -> &Driver {
        match kind {
            DriverKind::Rodio => &self.rodio,
            DriverKind::Symphonia => &self.symphonia,
        }
    }

    fn driver_mut(&mut self, kind: DriverKind) -> &mut Driver {
        match kind {
            DriverKind::Rodio => &mut self.rodio,
            DriverKind::Symphonia => &mut self.symphonia,
        }
    }

    fn active_mut(&mut self) -> &mut Driver {
        self.driver_mut(self.active)
    }
}
