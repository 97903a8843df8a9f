//! Control-thread half of a playback backend.
//!
//! A `Driver` validates and clamps transport requests, forwards them to its
//! worker thread, and applies the worker's events to its own observable
//! fields when `poll` is called. Worker events never touch driver state from
//! another thread.

use std::fs::File;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::library::Track;

use super::types::{
    DriverCallbacks, DriverEvent, DriverKind, ErrorCallback, SongEndedCallback, SpectrumCallback,
    WorkerCmd, WorkerLink, WorkerTuning, clamp_volume,
};
use super::{rodio_worker, symphonia_worker};

/// Starts a worker and returns the control-thread ends of its channels.
pub(crate) type Spawner = Box<dyn FnMut() -> WorkerLink + Send>;

pub struct Driver {
    kind: DriverKind,
    spawner: Spawner,
    link: Option<WorkerLink>,
    /// Bumped on every accepted load and on dispose; older worker messages are dropped.
    generation: u64,
    current_track: Option<Track>,
    playing: bool,
    position: f64,
    duration: f64,
    volume: f32,
    callbacks: DriverCallbacks,
}

impl Driver {
    pub fn new_rodio(tuning: WorkerTuning) -> Self {
        Self::with_spawner(
            DriverKind::Rodio,
            Box::new(move || rodio_worker::spawn(tuning)),
        )
    }

    pub fn new_symphonia(tuning: WorkerTuning) -> Self {
        Self::with_spawner(
            DriverKind::Symphonia,
            Box::new(move || symphonia_worker::spawn(tuning)),
        )
    }

    pub(crate) fn with_spawner(kind: DriverKind, spawner: Spawner) -> Self {
        Self {
            kind,
            spawner,
            link: None,
            generation: 0,
            current_track: None,
            playing: false,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
            callbacks: DriverCallbacks::default(),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Open `track` for playback.
    ///
    /// The file is checked synchronously; decoding happens on the worker and
    /// the duration arrives later through `DriverEvent::Ready`. A failed
    /// check fires the error callback and leaves the driver untouched.
    pub fn load(&mut self, track: &Track) -> bool {
        if let Err(err) = check_readable(track) {
            warn!(driver = self.kind.name(), path = %track.path.display(), "load rejected: {err}");
            self.callbacks.fire_error(&err.to_string());
            return false;
        }

        self.generation += 1;
        self.current_track = Some(track.clone());
        self.playing = false;
        self.position = 0.0;
        self.duration = 0.0;

        info!(driver = self.kind.name(), path = %track.path.display(), "loading");
        self.send(WorkerCmd::Load {
            generation: self.generation,
            path: track.path.clone(),
            duration_hint: track.duration,
        });
        true
    }

    pub fn play(&mut self) {
        if self.current_track.is_none() {
            return;
        }
        self.playing = true;
        self.send(WorkerCmd::Play);
    }

    pub fn pause(&mut self) {
        if self.current_track.is_none() {
            return;
        }
        self.playing = false;
        self.send(WorkerCmd::Pause);
    }

    pub fn stop(&mut self) {
        if self.current_track.is_none() {
            return;
        }
        self.playing = false;
        self.position = 0.0;
        self.send(WorkerCmd::Stop);
    }

    /// Seek to `secs`. Targets outside `0..=duration` are ignored.
    pub fn seek(&mut self, secs: f64) {
        if self.current_track.is_none() || !secs.is_finite() {
            return;
        }
        if secs < 0.0 || secs > self.duration {
            debug!(driver = self.kind.name(), secs, duration = self.duration, "seek ignored");
            return;
        }
        self.position = secs;
        self.send(WorkerCmd::Seek(Duration::from_secs_f64(secs)));
    }

    pub fn set_volume(&mut self, v: f32) {
        let Some(v) = clamp_volume(v) else {
            return;
        };
        self.volume = v;
        if self.link.is_some() {
            self.send(WorkerCmd::SetVolume(v));
        }
    }

    pub fn set_on_song_ended(&mut self, cb: SongEndedCallback) {
        self.callbacks.song_ended = Some(cb);
    }

    pub fn set_on_error(&mut self, cb: ErrorCallback) {
        self.callbacks.error = Some(cb);
    }

    pub fn set_on_spectrum(&mut self, cb: SpectrumCallback) {
        self.callbacks.spectrum = Some(cb);
    }

    /// Deliver a fault detected outside the worker through the error callback.
    pub(crate) fn report_error(&mut self, message: &str) {
        self.callbacks.fire_error(message);
    }

    pub(crate) fn take_callbacks(&mut self) -> DriverCallbacks {
        std::mem::take(&mut self.callbacks)
    }

    pub(crate) fn install_callbacks(&mut self, callbacks: DriverCallbacks) {
        self.callbacks = callbacks;
    }

    /// Shut the worker down and reset observable state. Safe to repeat.
    ///
    /// A later `load` starts a fresh worker.
    pub fn dispose(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.tx.send(WorkerCmd::Shutdown);
            if let Some(join) = link.join.take() {
                let _ = join.join();
            }
            debug!(driver = self.kind.name(), "worker shut down");
        }
        self.generation += 1;
        self.current_track = None;
        self.playing = false;
        self.position = 0.0;
        self.duration = 0.0;
    }

    /// Drop every queued worker message without applying it.
    pub(crate) fn discard_pending(&mut self) {
        if let Some(link) = self.link.as_ref() {
            while link.rx.try_recv().is_ok() {}
        }
    }

    /// Apply the worker's queued events for the current load.
    ///
    /// Returns the events that were applied, in arrival order.
    pub fn poll(&mut self) -> Vec<DriverEvent> {
        let Some(link) = self.link.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match link.rx.try_recv() {
                Ok(msg) if msg.generation == self.generation => events.push(msg.event),
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        for event in &events {
            self.apply(event);
        }

        if disconnected {
            warn!(driver = self.kind.name(), "worker exited unexpectedly");
            self.link = None;
            self.playing = false;
        }

        events
    }

    fn apply(&mut self, event: &DriverEvent) {
        match event {
            DriverEvent::Ready { duration } => self.duration = duration.max(0.0),
            DriverEvent::Playing => self.playing = true,
            DriverEvent::Paused => self.playing = false,
            DriverEvent::Stopped => {
                self.playing = false;
                self.position = 0.0;
            }
            DriverEvent::Position(secs) => self.position = secs.max(0.0),
            DriverEvent::EndOfMedia => {
                self.playing = false;
                self.position = self.duration;
                self.callbacks.fire_song_ended();
            }
            DriverEvent::Spectrum(bands) => self.callbacks.fire_spectrum(bands),
            DriverEvent::Error(message) => {
                warn!(driver = self.kind.name(), "playback fault: {message}");
                self.playing = false;
                self.callbacks.fire_error(message);
            }
        }
    }

    fn send(&mut self, cmd: WorkerCmd) {
        if self.link.is_none() {
            let link = (self.spawner)();
            let _ = link.tx.send(WorkerCmd::SetVolume(self.volume));
            self.link = Some(link);
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if link.tx.send(cmd).is_err() {
            warn!(driver = self.kind.name(), "worker gone, command dropped");
            self.link = None;
            self.playing = false;
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The file opens and is a regular file.
pub(super) fn check_readable(track: &Track) -> Result<(), DriverError> {
    File::open(&track.path).map_err(|source| DriverError::Open {
        path: track.path.clone(),
        source,
    })?;
    if !track.path.is_file() {
        return Err(DriverError::Probe {
            path: track.path.clone(),
            reason: "not a regular file".to_string(),
        });
    }
    Ok(())
}
